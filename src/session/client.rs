use crate::amf::{self, Amf0Value};
use crate::chunk::ChunkStream;
use crate::connection::{ConnOptions, Connection};
use crate::protocol::*;
use crate::session::{ConnectInfo, PublishInfo};
use crate::{Error, Result};
use log::trace;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

/// Dial-side tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub dial_timeout: Duration,
    pub conn: ConnOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            dial_timeout: Duration::from_secs(5),
            conn: ConnOptions::default(),
        }
    }
}

/// Client side of the command dialogue: issues connect, createStream and
/// publish or play, validating each response.
pub struct ClientSession<S: AsyncRead + AsyncWrite + Unpin> {
    conn: Arc<Connection<S>>,
    connect: ConnectInfo,
    publish: PublishInfo,
    /// Command whose response is being awaited.
    current: &'static str,
    /// Stream id granted by createStream.
    stream_id: u32,
    transaction_id: u32,
}

impl<S: AsyncRead + AsyncWrite + Unpin> std::fmt::Debug for ClientSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("stream_id", &self.stream_id)
            .field("transaction_id", &self.transaction_id)
            .finish()
    }
}

impl ClientSession<TcpStream> {
    /// Dial `rtmp://host[:port]/app/instance` and wrap the socket.
    pub async fn dial(rtmp_url: &str, config: &ClientConfig) -> Result<Self> {
        let url = Url::parse(rtmp_url).map_err(|e| Error::invalid_url(e.to_string()))?;

        if url.scheme() != "rtmp" {
            return Err(Error::invalid_url(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| Error::invalid_url("missing host"))?;
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let path = url.path().trim_start_matches('/');
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::invalid_url("path must be app/instance"));
        }

        let addr = format!("{}:{}", host, port);
        let stream = timeout(config.dial_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout("dial"))??;
        stream.set_nodelay(true)?;

        let tc_url = format!("rtmp://{}:{}/{}", host, port, parts[0]);
        let conn = Arc::new(Connection::new(stream, config.conn.clone()));

        Ok(ClientSession::new(parts[0], parts[1], &tc_url, conn))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ClientSession<S> {
    pub fn new(app: &str, instance: &str, tc_url: &str, conn: Arc<Connection<S>>) -> Self {
        ClientSession {
            conn,
            connect: ConnectInfo {
                app: app.to_string(),
                tc_url: tc_url.to_string(),
                ..ConnectInfo::default()
            },
            publish: PublishInfo {
                name: instance.to_string(),
                kind: PUBLISH_LIVE.to_string(),
                metadata: None,
            },
            current: "",
            stream_id: 0,
            transaction_id: 1,
        }
    }

    pub fn connection(&self) -> &Arc<Connection<S>> {
        &self.conn
    }

    /// App and stream name this client targets.
    pub fn info(&self) -> (String, String) {
        (self.connect.app.clone(), self.publish.name.clone())
    }

    pub fn publish_info(&self) -> &PublishInfo {
        &self.publish
    }

    pub fn connect_info(&self) -> &ConnectInfo {
        &self.connect
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Handshake, connect, createStream, then publish or play.
    pub async fn start(&mut self, method: &str) -> Result<()> {
        self.conn.handshake_client().await?;
        self.connect_command().await?;
        self.create_stream().await?;

        match method {
            PUBLISH => self.publish_command().await,
            PLAY => self.play_command().await,
            other => Err(Error::command(format!("unknown method '{}'", other))),
        }
    }

    pub async fn start_play(&mut self) -> Result<()> {
        self.start(PLAY).await
    }

    pub async fn start_publish(&mut self) -> Result<()> {
        self.start(PUBLISH).await
    }

    /// Pass-through read; command responses past linkup arrive as plain
    /// messages.
    pub async fn read(&self) -> Result<ChunkStream> {
        self.conn.read_message().await
    }

    pub async fn write(&self, cs: &mut ChunkStream) -> Result<()> {
        cs.unpack()?;
        self.conn.write_message(cs).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.conn.flush().await
    }

    pub async fn close(&self) -> Result<()> {
        self.conn.close().await
    }

    /// `connect` always runs under transaction id 1.
    async fn connect_command(&mut self) -> Result<()> {
        self.transaction_id = 1;
        self.current = CONNECT;

        let mut event = HashMap::new();
        event.insert("app".to_string(), Amf0Value::String(self.connect.app.clone()));
        event.insert(
            "flashVer".to_string(),
            Amf0Value::String(FLASH_VER.to_string()),
        );
        event.insert(
            "tcUrl".to_string(),
            Amf0Value::String(self.connect.tc_url.clone()),
        );

        trace!("connect chunk size before sending is {}", self.conn.chunk_size());

        self.send_command(&[
            Amf0Value::String(CONNECT.to_string()),
            Amf0Value::Number(self.transaction_id as f64),
            Amf0Value::Object(event),
        ])
        .await?;

        self.recv_response().await?;

        trace!("connect chunk size after sending is {}", self.conn.chunk_size());
        Ok(())
    }

    /// `<createStream>, <transaction id>, <nil>`
    async fn create_stream(&mut self) -> Result<()> {
        self.transaction_id += 1;
        self.current = CREATE_STREAM;

        self.send_command(&[
            Amf0Value::String(CREATE_STREAM.to_string()),
            Amf0Value::Number(self.transaction_id as f64),
            Amf0Value::Null,
        ])
        .await?;

        self.recv_response().await
    }

    /// `<publish>, <transaction id: 0>, <nil>, <name>, <type>`
    async fn publish_command(&mut self) -> Result<()> {
        self.current = PUBLISH;
        self.transaction_id += 1;

        self.send_command(&[
            Amf0Value::String(PUBLISH.to_string()),
            Amf0Value::Number(0.0),
            Amf0Value::Null,
            Amf0Value::String(self.publish.name.clone()),
            Amf0Value::String(PUBLISH_LIVE.to_string()),
        ])
        .await?;

        self.recv_response().await
    }

    /// `<play>, <transaction id: 0>, <nil>, <name>`
    async fn play_command(&mut self) -> Result<()> {
        self.current = PLAY;
        self.transaction_id += 1;

        self.send_command(&[
            Amf0Value::String(PLAY.to_string()),
            Amf0Value::Number(0.0),
            Amf0Value::Null,
            Amf0Value::String(self.publish.name.clone()),
        ])
        .await?;

        self.recv_response().await
    }

    /// Commands go out AMF0-encoded on CSID 3.
    async fn send_command(&self, values: &[Amf0Value]) -> Result<()> {
        let data = amf::encode_batch(values)?;
        let cs = ChunkStream::message(CSID_COMMAND, MSG_COMMAND_AMF0, self.stream_id, 0, &data);

        self.conn.write_message(&cs).await?;
        self.conn.flush().await
    }

    /// Validate the next command message against the command in flight.
    async fn recv_response(&mut self) -> Result<()> {
        loop {
            let cs = self.conn.read_message().await?;

            let cmd = match cs.type_id {
                MSG_COMMAND_AMF0 => amf::decode_batch(&cs.data)?,
                MSG_COMMAND_AMF3 => {
                    if cs.data.len() <= 1 {
                        return Err(Error::protocol("incomplete amf3 command"));
                    }
                    amf::decode_batch(&cs.data[1..])?
                }
                _ => continue,
            };

            for (k, v) in cmd.iter().enumerate() {
                match v {
                    Amf0Value::String(s) => self.check_string(s)?,
                    Amf0Value::Number(n) => self.check_number(k, *n)?,
                    Amf0Value::Object(_) | Amf0Value::EcmaArray(_) => self.check_object(v)?,
                    _ => {}
                }
            }

            return Ok(());
        }
    }

    fn check_string(&self, s: &str) -> Result<()> {
        match self.current {
            CONNECT | CREATE_STREAM => {
                if s != RESP_RESULT {
                    return Err(Error::command(format!(
                        "connect or createStream response result='{}'",
                        s
                    )));
                }
            }
            PUBLISH => {
                if s != ON_STATUS {
                    return Err(Error::InvalidResponse);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_number(&mut self, k: usize, n: f64) -> Result<()> {
        let id = n as i64;

        match self.current {
            CONNECT | CREATE_STREAM => match k {
                1 => {
                    if id != self.transaction_id as i64 {
                        return Err(Error::InvalidResponse);
                    }
                }
                3 => self.stream_id = id as u32,
                _ => {}
            },
            PUBLISH => {
                if id != 0 {
                    return Err(Error::InvalidResponse);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_object(&self, v: &Amf0Value) -> Result<()> {
        match self.current {
            CONNECT => {
                // Servers advertising an FMS version are taken at their
                // word; otherwise the status code has to spell success.
                if v.property("fmsVer").is_some() {
                    return Ok(());
                }

                match v.property("code").and_then(Amf0Value::as_str) {
                    Some(CODE_CONNECT_SUCCESS) => Ok(()),
                    _ => Err(Error::InvalidResponse),
                }
            }
            PUBLISH => match v.property("code").and_then(Amf0Value::as_str) {
                Some(CODE_PUBLISH_START) => Ok(()),
                Some(code) => Err(Error::command(format!(
                    "server returned publish code='{}'",
                    code
                ))),
                None => Err(Error::InvalidResponse),
            },
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn session(current: &'static str) -> ClientSession<DuplexStream> {
        let (near, _far) = tokio::io::duplex(1024);
        let conn = Arc::new(Connection::new(near, ConnOptions::default()));
        let mut s = ClientSession::new("live", "stream1", "rtmp://127.0.0.1:1935/live", conn);
        s.current = current;
        s
    }

    #[tokio::test]
    async fn test_dial_rejects_bad_urls() {
        let config = ClientConfig::default();

        for url in [
            "http://host/app/stream",
            "rtmp://host/onlyapp",
            "rtmp://host/app/stream/extra",
            "not a url",
        ] {
            let err = ClientSession::dial(url, &config).await.unwrap_err();
            assert!(matches!(err, Error::InvalidUrl(_)), "url={}", url);
        }
    }

    #[test]
    fn test_check_string_by_phase() {
        let s = session(CONNECT);
        assert!(s.check_string(RESP_RESULT).is_ok());
        assert!(s.check_string(ON_STATUS).is_err());

        let s = session(PUBLISH);
        assert!(s.check_string(ON_STATUS).is_ok());
        assert!(s.check_string(RESP_RESULT).is_err());

        // Play responses are accepted as-is.
        let s = session(PLAY);
        assert!(s.check_string(RESP_RESULT).is_ok());
        assert!(s.check_string(ON_STATUS).is_ok());
    }

    #[test]
    fn test_check_number_transaction_echo() {
        let mut s = session(CREATE_STREAM);
        s.transaction_id = 2;

        assert!(s.check_number(1, 2.0).is_ok());
        assert!(s.check_number(1, 3.0).is_err());

        // Position 3 carries the granted stream id.
        s.check_number(3, 5.0).unwrap();
        assert_eq!(s.stream_id(), 5);
    }

    #[test]
    fn test_check_object_connect() {
        let s = session(CONNECT);

        let mut obj = HashMap::new();
        obj.insert("fmsVer".to_string(), Amf0Value::String(FMS_VER.to_string()));
        assert!(s.check_object(&Amf0Value::Object(obj)).is_ok());

        let mut obj = HashMap::new();
        obj.insert(
            "code".to_string(),
            Amf0Value::String(CODE_CONNECT_SUCCESS.to_string()),
        );
        assert!(s.check_object(&Amf0Value::Object(obj)).is_ok());

        let mut obj = HashMap::new();
        obj.insert(
            "code".to_string(),
            Amf0Value::String("NetConnection.Connect.Rejected".to_string()),
        );
        assert!(s.check_object(&Amf0Value::Object(obj)).is_err());
    }

    #[test]
    fn test_check_object_publish() {
        let s = session(PUBLISH);

        let mut obj = HashMap::new();
        obj.insert(
            "code".to_string(),
            Amf0Value::String(CODE_PUBLISH_START.to_string()),
        );
        assert!(s.check_object(&Amf0Value::Object(obj)).is_ok());

        let mut obj = HashMap::new();
        obj.insert(
            "code".to_string(),
            Amf0Value::String("NetStream.Publish.BadName".to_string()),
        );
        let err = s.check_object(&Amf0Value::Object(obj)).unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }
}
