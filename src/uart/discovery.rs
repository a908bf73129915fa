use crate::error::LinkError;

/// Device-name prefix the microcontroller enumerates under, keyed by
/// `std::env::consts::OS`.
pub const PORT_PREFIXES: &[(&str, &str)] = &[
    ("macos", "/dev/cu.usb"),
    ("linux", "/dev/ttyACM"),
    ("windows", "COM"),
];

pub fn prefix_for(os: &str) -> Option<&'static str>{
    PORT_PREFIXES
        .iter()
        .find(|(tag, _)| *tag == os)
        .map(|(_, prefix)| *prefix)
}

/// Port selection rule, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortFilter{
    /// Exact device name, skips enumeration.
    Explicit(String),
    /// First enumerated device whose name starts with the prefix.
    Prefix(String),
    /// Host OS has no table entry; nothing will match.
    Unsupported(String),
}

impl PortFilter{
    pub fn for_os(os: &str) -> Self{
        match prefix_for(os){
            Some(prefix) => PortFilter::Prefix(prefix.to_string()),
            None => PortFilter::Unsupported(os.to_string()),
        }
    }

    pub fn for_host() -> Self{
        Self::for_os(std::env::consts::OS)
    }

    /// Explicit port wins over a prefix override, which wins over the host
    /// table.
    pub fn resolve(port: Option<&str>, prefix: Option<&str>) -> Self{
        match (port, prefix){
            (Some(port), _) => PortFilter::Explicit(port.to_string()),
            (None, Some(prefix)) => PortFilter::Prefix(prefix.to_string()),
            (None, None) => Self::for_host(),
        }
    }

    pub fn select<'a, I>(&self, ports: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self{
            PortFilter::Explicit(name) => Some(name.clone()),
            PortFilter::Prefix(prefix) => select_port(ports, prefix).map(str::to_string),
            PortFilter::Unsupported(_) => None,
        }
    }
}

/// First entry in enumeration order that starts with `prefix`.
pub fn select_port<'a, I>(ports: I, prefix: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    ports.into_iter().find(|name| name.starts_with(prefix))
}

pub fn available_ports() -> Result<Vec<String>, LinkError>{
    let ports = serialport::available_ports().map_err(LinkError::Enumerate)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests{
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("linux", Some("/dev/ttyACM"))]
    #[case("macos", Some("/dev/cu.usb"))]
    #[case("windows", Some("COM"))]
    #[case("freebsd", None)]
    fn test_prefix_table(#[case] os: &str, #[case] expected: Option<&str>){
        assert_eq!(prefix_for(os), expected);
    }

    #[rstest]
    #[case("linux", &["/dev/ttyS0", "/dev/ttyACM1", "/dev/ttyACM0"], Some("/dev/ttyACM1"))]
    #[case("macos", &["/dev/cu.Bluetooth", "/dev/cu.usbmodem1101"], Some("/dev/cu.usbmodem1101"))]
    #[case("windows", &["COM3", "COM4"], Some("COM3"))]
    #[case("linux", &["/dev/ttyUSB0"], None)]
    #[case("linux", &[], None)]
    fn test_first_match_wins(#[case] os: &str, #[case] ports: &[&str], #[case] expected: Option<&str>){
        let filter = PortFilter::for_os(os);
        assert_eq!(filter.select(ports.iter().copied()).as_deref(), expected);
    }

    #[test]
    fn test_unsupported_os_never_matches(){
        let filter = PortFilter::for_os("haiku");
        assert_eq!(filter, PortFilter::Unsupported("haiku".into()));
        assert_eq!(filter.select(["/dev/ttyACM0"]), None);
    }

    #[test]
    fn test_resolve_precedence(){
        assert_eq!(
            PortFilter::resolve(Some("/dev/rov"), Some("/dev/tty")),
            PortFilter::Explicit("/dev/rov".into())
        );
        assert_eq!(
            PortFilter::resolve(None, Some("/dev/ttyUSB")),
            PortFilter::Prefix("/dev/ttyUSB".into())
        );
        assert_eq!(PortFilter::resolve(None, None), PortFilter::for_host());
    }

    #[test]
    fn test_match_is_prefix_not_substring(){
        assert_eq!(select_port(["/dev/xCOM1"], "COM"), None);
    }
}
