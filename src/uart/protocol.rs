//! Wire format shared with the microcontroller.
//!
//! The two directions are framed differently and both must stay bit-exact:
//! - host → peer: one JSON object followed by a single NUL byte, no newline
//! - peer → host: one JSON object per `\n`-terminated UTF-8 line

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FrameError;
use crate::rov::mapper::Pulsewidth;

pub const OUTBOUND_TERMINATOR: u8 = 0x00;
pub const INBOUND_DELIMITER: u8 = b'\n';
pub const MAX_LINE_LEN: usize = 4096;

/// One command frame. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage{
    /// left, right, top-left, top-right
    #[serde(rename = "axisInfo")]
    pub axis_info: [Pulsewidth; 4],
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub claw: Pulsewidth,
    pub claw2: Pulsewidth,
}

impl OutboundMessage{
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error>{
        let mut frame = serde_json::to_vec(self)?;
        frame.push(OUTBOUND_TERMINATOR);
        Ok(frame)
    }
}

/// A decoded inbound line. Field names and values are whatever the firmware
/// chose to send.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InboundTelemetry(Map<String, Value>);

impl InboundTelemetry{
    pub fn get(&self, field: &str) -> Option<&Value>{
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)>{
        self.0.iter()
    }

    pub fn len(&self) -> usize{
        self.0.len()
    }

    pub fn is_empty(&self) -> bool{
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value>{
        self.0
    }
}

impl From<Map<String, Value>> for InboundTelemetry{
    fn from(map: Map<String, Value>) -> Self{
        InboundTelemetry(map)
    }
}

/// Decodes one line without its delimiter. Blank lines yield `Ok(None)`.
pub fn decode_line(line: &[u8]) -> Result<Option<InboundTelemetry>, FrameError>{
    let text = std::str::from_utf8(line)?.trim();
    if text.is_empty(){
        return Ok(None);
    }

    match serde_json::from_str::<Value>(text)?{
        Value::Object(map) => Ok(Some(InboundTelemetry(map))),
        Value::Array(_) => Err(FrameError::NotAnObject("array")),
        Value::String(_) => Err(FrameError::NotAnObject("string")),
        Value::Number(_) => Err(FrameError::NotAnObject("number")),
        Value::Bool(_) => Err(FrameError::NotAnObject("bool")),
        Value::Null => Err(FrameError::NotAnObject("null")),
    }
}

/// Reassembles newline-delimited lines from arbitrary read chunks.
#[derive(Debug, Default)]
pub struct LineAssembler{
    rx_buffer: Vec<u8>,
    discarding: bool,
}

impl LineAssembler{
    pub fn new() -> Self{
        LineAssembler{
            rx_buffer: Vec::with_capacity(512),
            discarding: false,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]){
        self.rx_buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize{
        self.rx_buffer.len()
    }

    /// Next complete line, delimiter stripped. A line that outgrows
    /// [`MAX_LINE_LEN`] is reported once and its remainder skipped.
    pub fn next_line(&mut self) -> Option<Result<Vec<u8>, FrameError>>{
        loop{
            match self.rx_buffer.iter().position(|&b| b == INBOUND_DELIMITER){
                Some(pos) =>{
                    let mut line: Vec<u8> = self.rx_buffer.drain(..=pos).collect();
                    line.pop();

                    if self.discarding{
                        //tail of an oversize line
                        self.discarding = false;
                        continue;
                    }
                    if line.len() > MAX_LINE_LEN{
                        return Some(Err(FrameError::Oversize{ limit: MAX_LINE_LEN }));
                    }
                    return Some(Ok(line));
                }
                None =>{
                    if self.rx_buffer.len() > MAX_LINE_LEN{
                        self.rx_buffer.clear();
                        if !self.discarding{
                            self.discarding = true;
                            return Some(Err(FrameError::Oversize{ limit: MAX_LINE_LEN }));
                        }
                    }
                    return None;
                }
            }
        }
    }
}
