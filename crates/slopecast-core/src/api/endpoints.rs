//! URL layout of the data corpus.
//!
//! ```text
//! index.json
//! <resort>/terrain/<date>.json
//! <resort>/snow/<date>.json, <resort>/snow/latest.json
//! <resort>/lifts/index.json
//! <resort>/lifts/data/<slug>.json
//! <resort>/trails/data/<slug>.json
//! <resort>/brief/latest.json
//! ```

use chrono::NaiveDate;
use reqwest::Url;

use super::FetchError;
use crate::utils::format::DAY_FORMAT;

#[derive(Debug, Clone)]
pub struct Endpoints {
    root: Url,
}

/// Keys and slugs become path segments; anything that could escape the
/// resort directory is refused.
fn check_segment(segment: &str) -> Result<&str, FetchError> {
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(segment)
    } else {
        Err(FetchError::InvalidUrl(segment.to_string()))
    }
}

impl Endpoints {
    /// `root` must end with `/` so relative joins stay beneath it.
    pub fn new(root: Url) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    fn join(&self, path: &str) -> Result<Url, FetchError> {
        self.root
            .join(path)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", path, e)))
    }

    pub fn index(&self) -> Result<Url, FetchError> {
        self.join("index.json")
    }

    pub fn terrain(&self, resort: &str, date: NaiveDate) -> Result<Url, FetchError> {
        let resort = check_segment(resort)?;
        self.join(&format!("{}/terrain/{}.json", resort, date.format(DAY_FORMAT)))
    }

    pub fn weather(&self, resort: &str, date: NaiveDate) -> Result<Url, FetchError> {
        let resort = check_segment(resort)?;
        self.join(&format!("{}/snow/{}.json", resort, date.format(DAY_FORMAT)))
    }

    pub fn weather_latest(&self, resort: &str) -> Result<Url, FetchError> {
        let resort = check_segment(resort)?;
        self.join(&format!("{}/snow/latest.json", resort))
    }

    pub fn lifts(&self, resort: &str) -> Result<Url, FetchError> {
        let resort = check_segment(resort)?;
        self.join(&format!("{}/lifts/index.json", resort))
    }

    pub fn lift_detail(&self, resort: &str, slug: &str) -> Result<Url, FetchError> {
        let resort = check_segment(resort)?;
        let slug = check_segment(slug)?;
        self.join(&format!("{}/lifts/data/{}.json", resort, slug))
    }

    pub fn trail_detail(&self, resort: &str, slug: &str) -> Result<Url, FetchError> {
        let resort = check_segment(resort)?;
        let slug = check_segment(slug)?;
        self.join(&format!("{}/trails/data/{}.json", resort, slug))
    }

    pub fn brief(&self, resort: &str) -> Result<Url, FetchError> {
        let resort = check_segment(resort)?;
        self.join(&format!("{}/brief/latest.json", resort))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::new(Url::parse("https://slopecast.app/data/").unwrap())
    }

    #[test]
    fn test_corpus_layout() {
        let e = endpoints();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(e.index().unwrap().as_str(), "https://slopecast.app/data/index.json");
        assert_eq!(
            e.terrain("alta", date).unwrap().as_str(),
            "https://slopecast.app/data/alta/terrain/2024-01-05.json"
        );
        assert_eq!(
            e.weather("alta", date).unwrap().as_str(),
            "https://slopecast.app/data/alta/snow/2024-01-05.json"
        );
        assert_eq!(
            e.weather_latest("alta").unwrap().as_str(),
            "https://slopecast.app/data/alta/snow/latest.json"
        );
        assert_eq!(
            e.lift_detail("alta", "collins").unwrap().as_str(),
            "https://slopecast.app/data/alta/lifts/data/collins.json"
        );
        assert_eq!(
            e.brief("alta").unwrap().as_str(),
            "https://slopecast.app/data/alta/brief/latest.json"
        );
    }

    #[test]
    fn test_rejects_path_escapes() {
        let e = endpoints();
        assert!(matches!(e.trail_detail("alta", "../secrets"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(e.lifts("a/b"), Err(FetchError::InvalidUrl(_))));
        assert!(e.lift_detail("alta", "").is_err());
    }
}
