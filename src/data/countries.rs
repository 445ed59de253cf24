/// ISO3 code → English name as used by the World Bank export.
///
/// The macro download stores the country *name* in its `ISO3` column, so
/// loading goes through this table to get a key that joins with the market
/// history (which carries real ISO3 codes).
pub const COUNTRIES: &[(&str, &str)] = &[
    ("ARG", "Argentina"),
    ("AUS", "Australia"),
    ("AUT", "Austria"),
    ("BEL", "Belgium"),
    ("BRA", "Brazil"),
    ("CAN", "Canada"),
    ("CHE", "Switzerland"),
    ("CHL", "Chile"),
    ("CHN", "China"),
    ("COL", "Colombia"),
    ("DEU", "Germany"),
    ("DNK", "Denmark"),
    ("EGY", "Egypt"),
    ("ESP", "Spain"),
    ("FRA", "France"),
    ("GBR", "United Kingdom"),
    ("GRC", "Greece"),
    ("HKG", "Hong Kong"),
    ("IDN", "Indonesia"),
    ("IND", "India"),
    ("IRL", "Ireland"),
    ("ISR", "Israel"),
    ("ITA", "Italy"),
    ("JPN", "Japan"),
    ("KOR", "South Korea"),
    ("MEX", "Mexico"),
    ("MYS", "Malaysia"),
    ("NLD", "Netherlands"),
    ("NOR", "Norway"),
    ("NZL", "New Zealand"),
    ("PER", "Peru"),
    ("PHL", "Philippines"),
    ("POL", "Poland"),
    ("PRT", "Portugal"),
    ("RUS", "Russia"),
    ("SAU", "Saudi Arabia"),
    ("SGP", "Singapore"),
    ("SWE", "Sweden"),
    ("THA", "Thailand"),
    ("TUR", "Turkey"),
    ("TWN", "Taiwan"),
    ("USA", "United States"),
    ("VNM", "Vietnam"),
    ("ZAF", "South Africa"),
    ("NGA", "Nigeria"),
    ("PAK", "Pakistan"),
];

/// Resolve a country cell to its ISO3 code. Accepts either a known code
/// (any case) or the exact English name.
pub fn to_iso3(country: &str) -> Option<&'static str> {
    let country = country.trim();
    COUNTRIES
        .iter()
        .find(|(iso, name)| iso.eq_ignore_ascii_case(country) || *name == country)
        .map(|(iso, _)| *iso)
}

pub fn name_of(iso3: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(iso, _)| *iso == iso3)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_code_resolve() {
        assert_eq!(to_iso3("Brazil"), Some("BRA"));
        assert_eq!(to_iso3("bra"), Some("BRA"));
        assert_eq!(to_iso3("Atlantis"), None);
        assert_eq!(name_of("KOR"), Some("South Korea"));
    }
}
