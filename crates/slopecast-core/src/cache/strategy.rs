use reqwest::Url;

/// Kind of resource, decided from the URL path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    StaticAsset,
    Data,
    Page,
    Unclassified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve the cached copy, refresh it in the background
    CacheFirst,
    /// Try the network, fall back to the cached copy
    NetworkFirst,
    /// Straight to the network, never cached
    Passthrough,
}

const STATIC_EXTENSIONS: &[&str] = &["css", "js", "png", "ico", "svg", "woff2"];
const DATA_EXTENSIONS: &[&str] = &["json", "ndjson"];
const PAGE_EXTENSIONS: &[&str] = &["html"];

pub fn classify(url: &Url) -> ResourceClass {
    let path = url.path();
    if path.ends_with('/') {
        return ResourceClass::Page;
    }

    let last_segment = path.rsplit('/').next().unwrap_or(path);
    let Some((_, extension)) = last_segment.rsplit_once('.') else {
        return ResourceClass::Unclassified;
    };
    let extension = extension.to_ascii_lowercase();

    if STATIC_EXTENSIONS.contains(&extension.as_str()) {
        ResourceClass::StaticAsset
    } else if DATA_EXTENSIONS.contains(&extension.as_str()) {
        ResourceClass::Data
    } else if PAGE_EXTENSIONS.contains(&extension.as_str()) {
        ResourceClass::Page
    } else {
        ResourceClass::Unclassified
    }
}

impl ResourceClass {
    pub fn strategy(&self) -> Strategy {
        match self {
            ResourceClass::StaticAsset => Strategy::CacheFirst,
            ResourceClass::Data | ResourceClass::Page => Strategy::NetworkFirst,
            ResourceClass::Unclassified => Strategy::Passthrough,
        }
    }
}
