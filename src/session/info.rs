use crate::amf::Amf0Object;

/// Arguments of the `connect` command object.
#[derive(Debug, Default, Clone)]
pub struct ConnectInfo {
    pub app: String,
    pub flash_ver: String,
    pub swf_url: String,
    /// URL of the target stream, `proto://host[:port]/app` by default.
    pub tc_url: String,
    pub fpad: bool,
    pub audio_codecs: i64,
    pub video_codecs: i64,
    pub video_function: i64,
    pub page_url: String,
    pub object_encoding: i64,
}

/// Arguments of the `publish` command plus the stream metadata captured
/// from `@setDataFrame`.
#[derive(Debug, Default, Clone)]
pub struct PublishInfo {
    /// Name of the published stream.
    pub name: String,
    /// "live", "record" or "append"; only "live" carries weight here.
    pub kind: String,
    /// The `onMetaData` object, once the publisher sent it.
    pub metadata: Option<Amf0Object>,
}

/// Identity of one stream endpoint, used for logging and bookkeeping.
#[derive(Debug, Clone)]
pub struct Info {
    pub app: String,
    pub instance: String,
    /// `app/instance`, the registry key.
    pub key: String,
    /// True for endpoints we dialed, false for accepted ones.
    pub external: bool,
}

impl Info {
    pub fn new(app: &str, instance: &str, external: bool) -> Self {
        Info {
            app: app.to_string(),
            instance: instance.to_string(),
            key: format!("{}/{}", app, instance),
            external,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_key() {
        let info = Info::new("live", "stream1", false);
        assert_eq!(info.key, "live/stream1");
        assert!(!info.external);
    }
}
