/// Formats a project format version for display.
///
/// Versions from 1000 on encode `major * 100 + minor * 10 + patch`; trailing zero
/// components are dropped. Smaller values are older or unknown schemes and are
/// returned as-is.
///
/// ```
/// use flp::format_version;
///
/// assert_eq!(format_version(2008), "20.0.8");
/// assert_eq!(format_version(2400), "24");
/// assert_eq!(format_version(2411), "24.1.1");
/// assert_eq!(format_version(2410), "24.1");
/// assert_eq!(format_version(0), "0");
/// ```
pub fn format_version(version: u32) -> String {
    if version < 1000 {
        return version.to_string();
    }

    let major = version / 100;
    let minor = (version % 100) / 10;
    let patch = version % 10;

    match (minor, patch) {
        (0, 0) => major.to_string(),
        (_, 0) => format!("{}.{}", major, minor),
        _ => format!("{}.{}.{}", major, minor, patch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recombine(formatted: &str) -> u32 {
        let parts: Vec<u32> = formatted.split('.').map(|p| p.parse().unwrap()).collect();
        let major = parts[0];
        let minor = parts.get(1).copied().unwrap_or(0);
        let patch = parts.get(2).copied().unwrap_or(0);
        major * 100 + minor * 10 + patch
    }

    #[test]
    fn test_formats_known_versions() {
        assert_eq!(format_version(2008), "20.0.8");
        assert_eq!(format_version(2100), "21");
        assert_eq!(format_version(2400), "24");
        assert_eq!(format_version(2411), "24.1.1");
        assert_eq!(format_version(1000), "10");
        assert_eq!(format_version(1205), "12.0.5");
    }

    #[test]
    fn test_2410_drops_the_trailing_zero() {
        assert_eq!(format_version(2410), "24.1");
    }

    #[test]
    fn test_legacy_versions_are_returned_verbatim() {
        for v in [0, 1, 9, 100, 999] {
            assert_eq!(format_version(v), v.to_string());
        }
    }

    #[test]
    fn test_round_trips_every_modern_version() {
        for v in 1000..=u32::from(u16::MAX) {
            let formatted = format_version(v);
            assert_eq!(recombine(&formatted), v, "{} formatted as {}", v, formatted);
            assert!(!formatted.ends_with(".0"), "{} has a trailing zero", formatted);
        }
    }
}
