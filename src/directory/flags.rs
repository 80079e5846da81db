//! Country flag assets served from the site root.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagAsset {
    pub alt: &'static str,
    pub src: &'static str,
}

const BRASIL: FlagAsset = FlagAsset {
    alt: "Brasil",
    src: "/brasil.png",
};
const CANADA: FlagAsset = FlagAsset {
    alt: "Canada",
    src: "/canada.png",
};
const ESTADOS_UNIDOS: FlagAsset = FlagAsset {
    alt: "Estados Unidos",
    src: "/estados-unidos.png",
};

/// Lowercase, single spaces, `.` and `_` become `-`.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace(['.', '_'], "-")
}

#[must_use]
pub fn flag_for_country(country: Option<&str>) -> Option<FlagAsset> {
    let key = normalize_key(country?);
    match key.as_str() {
        "brasil" | "brazil" | "br" => Some(BRASIL),
        "canada" | "ca" => Some(CANADA),
        "estados unidos" | "estados-unidos" | "united states" | "usa" | "us" => {
            Some(ESTADOS_UNIDOS)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_share_assets() {
        assert_eq!(flag_for_country(Some("Brazil")), Some(BRASIL));
        assert_eq!(flag_for_country(Some(" BR ")), Some(BRASIL));
        assert_eq!(flag_for_country(Some("United   States")), Some(ESTADOS_UNIDOS));
        assert_eq!(flag_for_country(Some("estados_unidos")), Some(ESTADOS_UNIDOS));
        assert_eq!(flag_for_country(Some("USA")), Some(ESTADOS_UNIDOS));
        assert_eq!(flag_for_country(Some("ca")), Some(CANADA));
    }

    #[test]
    fn unknown_or_missing() {
        assert_eq!(flag_for_country(Some("Portugal")), None);
        assert_eq!(flag_for_country(None), None);
        assert_eq!(flag_for_country(Some("")), None);
    }
}
