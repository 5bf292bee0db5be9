use crate::amf::{self, Amf0Object, Amf0Value};
use crate::chunk::ChunkStream;
use crate::connection::Connection;
use crate::message;
use crate::protocol::*;
use crate::session::{ConnectInfo, PublishInfo};
use crate::{Error, Result};
use log::{debug, error, trace};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Server side of the command dialogue: accepts one client's connect /
/// createStream / publish-or-play sequence and answers it.
pub struct ServerSession<S: AsyncRead + AsyncWrite + Unpin> {
    conn: Arc<Connection<S>>,
    /// True once the client asked to publish or play.
    done: bool,
    /// Last command name accepted.
    method: &'static str,
    /// Stream length answered to getStreamLength; live streams are 0.
    duration: u32,
    /// Stream id handed out by createStream.
    stream_id: u32,
    transaction_id: u32,
    connect: ConnectInfo,
    publish: PublishInfo,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ServerSession<S> {
    pub fn new(conn: Arc<Connection<S>>) -> Self {
        ServerSession {
            conn,
            done: false,
            method: "",
            duration: 0,
            stream_id: 1,
            transaction_id: 0,
            connect: ConnectInfo::default(),
            publish: PublishInfo::default(),
        }
    }

    pub fn connection(&self) -> &Arc<Connection<S>> {
        &self.conn
    }

    /// App and stream name the client asked for.
    pub fn info(&self) -> (String, String) {
        (self.connect.app.clone(), self.publish.name.clone())
    }

    pub fn publish_info(&self) -> &PublishInfo {
        &self.publish
    }

    pub fn connect_info(&self) -> &ConnectInfo {
        &self.connect
    }

    /// The command that completed the linkup, "publish" or "play".
    pub fn method(&self) -> &str {
        self.method
    }

    /// Answer the handshake and run the command dialogue until the
    /// client asked to publish or play. One call per session.
    pub async fn command_linkup(&mut self) -> Result<()> {
        while !self.done {
            let cs = self.conn.read_message().await?;
            self.handle_command_message(&cs).await?;
        }
        Ok(())
    }

    /// Read the next message, answering command traffic and capturing
    /// metadata along the way.
    pub async fn read(&mut self) -> Result<ChunkStream> {
        loop {
            let cs = self.conn.read_message().await?;

            match cs.type_id {
                MSG_DATA_AMF0 | MSG_DATA_AMF3 => {
                    self.handle_data_message(&cs)?;
                    return Ok(cs);
                }
                MSG_COMMAND_AMF0 => {
                    self.handle_command_message(&cs).await?;
                }
                _ => return Ok(cs),
            }
        }
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

    /// Decode and dispatch one command message; other message types pass
    /// through untouched.
    async fn handle_command_message(&mut self, cs: &ChunkStream) -> Result<()> {
        // Only AMF0 is spoken here. An AMF3 command is AMF0 after the
        // leading format byte.
        let body: &[u8] = match cs.type_id {
            MSG_COMMAND_AMF3 => {
                if cs.data.len() <= 1 {
                    return Err(Error::protocol("incomplete amf3 command"));
                }
                &cs.data[1..]
            }
            MSG_COMMAND_AMF0 => &cs.data,
            _ => return Ok(()),
        };

        let cmd = amf::decode_batch(body)?;
        if cmd.is_empty() {
            return Err(Error::command("empty command message"));
        }

        let name = cmd[0]
            .as_str()
            .ok_or_else(|| Error::command("command name is not a string"))?
            .to_string();

        trace!("server handles command {}", name);

        match name.as_str() {
            CONNECT => self.connect_message(cs, &cmd).await,
            CREATE_STREAM => self.create_stream_message(cs, &cmd).await,
            PUBLISH => self.publish_message(cs, &cmd).await,
            PLAY => self.play_message(cs, &cmd).await,
            RELEASE_STREAM => {
                self.transaction_id = 0;
                self.method = RELEASE_STREAM;
                Ok(())
            }
            FC_PUBLISH => {
                self.publish = PublishInfo::default();
                self.method = FC_PUBLISH;
                Ok(())
            }
            GET_STREAM_LENGTH => self.get_stream_length_message(cs, &cmd).await,
            DELETE_STREAM => self.delete_stream_message(&cmd),
            FC_UNPUBLISH => self.fc_unpublish_message(&cmd),
            _ => {
                // Unknown commands stay non-fatal for interoperability.
                error!("unrealized command message='{}'", name);
                Ok(())
            }
        }
    }

    async fn connect_message(&mut self, cs: &ChunkStream, cmd: &[Amf0Value]) -> Result<()> {
        if cmd.len() <= 1 {
            return Err(Error::command(format!(
                "incomplete connect command, length={}",
                cmd.len()
            )));
        }

        self.handle_connect(&cmd[1..])?;
        self.rsp_connect(cs).await?;

        self.method = CONNECT;
        Ok(())
    }

    /// `<connect>, <transaction id: 1>, <command object>, <optional args>`
    fn handle_connect(&mut self, args: &[Amf0Value]) -> Result<()> {
        for (k, v) in args.iter().enumerate() {
            match v {
                Amf0Value::Number(n) => {
                    if *n as i64 != 1 {
                        return Err(Error::command(format!(
                            "invalid transaction id={}",
                            n
                        )));
                    }
                    self.transaction_id = 1;
                }
                Amf0Value::Object(obj) => {
                    if k == 1 {
                        self.read_connect_object(obj);
                    } else {
                        debug!("unrealized optional user object");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read_connect_object(&mut self, obj: &Amf0Object) {
        let get_str = |key: &str| obj.get(key).and_then(Amf0Value::as_str).map(str::to_string);
        let get_num = |key: &str| obj.get(key).and_then(Amf0Value::as_number);

        if let Some(app) = get_str("app") {
            self.connect.app = app;
        }
        if let Some(flash_ver) = get_str("flashVer") {
            self.connect.flash_ver = flash_ver;
        }
        if let Some(swf_url) = get_str("swfUrl") {
            self.connect.swf_url = swf_url;
        }
        if let Some(tc_url) = get_str("tcUrl") {
            self.connect.tc_url = tc_url;
        }
        if let Some(fpad) = obj.get("fpad").and_then(Amf0Value::as_boolean) {
            self.connect.fpad = fpad;
        }
        if let Some(n) = get_num("audioCodecs") {
            self.connect.audio_codecs = n as i64;
        }
        if let Some(n) = get_num("videoCodecs") {
            self.connect.video_codecs = n as i64;
        }
        if let Some(n) = get_num("videoFunction") {
            self.connect.video_function = n as i64;
        }
        if let Some(page_url) = get_str("pageUrl") {
            self.connect.page_url = page_url;
        }
        if let Some(n) = get_num("objectEncoding") {
            self.connect.object_encoding = n as i64;
        }
    }

    /// Window, bandwidth and chunk size first, then the `_result`.
    async fn rsp_connect(&mut self, cs: &ChunkStream) -> Result<()> {
        let c = message::window_ack_size(self.conn.window_ack_size());
        self.conn.write_message(&c).await?;

        let c = message::set_peer_bandwidth(self.conn.remote_chunk_size());
        self.conn.write_message(&c).await?;

        let c = message::set_chunk_size(self.conn.chunk_size());
        self.conn.write_message(&c).await?;

        let mut resp = HashMap::new();
        resp.insert("fmsVer".to_string(), Amf0Value::String(FMS_VER.to_string()));
        resp.insert("capabilities".to_string(), Amf0Value::Number(CAPABILITIES));

        let mut event = HashMap::new();
        event.insert("level".to_string(), Amf0Value::String(LEVEL_STATUS.to_string()));
        event.insert(
            "code".to_string(),
            Amf0Value::String(CODE_CONNECT_SUCCESS.to_string()),
        );
        event.insert(
            "description".to_string(),
            Amf0Value::String("Connection succeeded.".to_string()),
        );
        event.insert(
            "objectEncoding".to_string(),
            Amf0Value::Number(self.connect.object_encoding as f64),
        );

        self.send_command(
            cs.csid,
            cs.stream_id,
            &[
                Amf0Value::String(RESP_RESULT.to_string()),
                Amf0Value::Number(self.transaction_id as f64),
                Amf0Value::Object(resp),
                Amf0Value::Object(event),
            ],
        )
        .await
    }

    async fn create_stream_message(&mut self, cs: &ChunkStream, cmd: &[Amf0Value]) -> Result<()> {
        if cmd.len() <= 1 {
            return Err(Error::command(format!(
                "incomplete createStream command, length={}",
                cmd.len()
            )));
        }

        for v in &cmd[1..] {
            match v {
                Amf0Value::Number(n) => self.transaction_id = *n as u32,
                Amf0Value::Object(_) => debug!("unrealized createStream object"),
                _ => {}
            }
        }

        self.rsp_create_stream(cs).await?;

        self.method = CREATE_STREAM;
        Ok(())
    }

    /// The result is the assigned stream id.
    async fn rsp_create_stream(&mut self, cs: &ChunkStream) -> Result<()> {
        self.send_command(
            cs.csid,
            cs.stream_id,
            &[
                Amf0Value::String(RESP_RESULT.to_string()),
                Amf0Value::Number(self.transaction_id as f64),
                Amf0Value::Null,
                Amf0Value::Number(self.stream_id as f64),
            ],
        )
        .await
    }

    async fn publish_message(&mut self, cs: &ChunkStream, cmd: &[Amf0Value]) -> Result<()> {
        if cmd.len() <= 1 {
            return Err(Error::command(format!(
                "incomplete publish command, length={}",
                cmd.len()
            )));
        }

        self.handle_publish(&cmd[1..])?;
        self.rsp_publish(cs).await?;

        self.done = true;
        self.method = PUBLISH;
        Ok(())
    }

    /// `<publish>, <transaction id: 0>, <nil>, <name>, <type>`
    fn handle_publish(&mut self, args: &[Amf0Value]) -> Result<()> {
        for (k, v) in args.iter().enumerate() {
            match v {
                Amf0Value::Number(n) => self.transaction_id = *n as u32,
                Amf0Value::String(s) => match k {
                    2 => {
                        self.publish.name = s.clone();
                        debug!("publish name={}", self.publish.name);
                    }
                    3 => match s.as_str() {
                        PUBLISH_LIVE | PUBLISH_RECORD | PUBLISH_APPEND => {
                            self.publish.kind = s.clone();
                        }
                        other => {
                            return Err(Error::command(format!(
                                "invalid publish type='{}'",
                                other
                            )));
                        }
                    },
                    _ => {}
                },
                _ => {}
            }
        }
        Ok(())
    }

    async fn rsp_publish(&mut self, cs: &ChunkStream) -> Result<()> {
        let mut event = HashMap::new();
        event.insert("level".to_string(), Amf0Value::String(LEVEL_STATUS.to_string()));
        event.insert(
            "code".to_string(),
            Amf0Value::String(CODE_PUBLISH_START.to_string()),
        );
        event.insert(
            "description".to_string(),
            Amf0Value::String("Start publishing.".to_string()),
        );

        self.send_command(
            cs.csid,
            cs.stream_id,
            &[
                Amf0Value::String(ON_STATUS.to_string()),
                Amf0Value::Number(0.0),
                Amf0Value::Null,
                Amf0Value::Object(event),
            ],
        )
        .await
    }

    async fn play_message(&mut self, cs: &ChunkStream, cmd: &[Amf0Value]) -> Result<()> {
        if cmd.len() <= 1 {
            return Err(Error::command(format!(
                "incomplete play command, length={}",
                cmd.len()
            )));
        }

        self.handle_play(&cmd[1..])?;
        self.rsp_play(cs).await?;

        self.done = true;
        self.method = PLAY;
        Ok(())
    }

    /// `<play>, <transaction id: 0>, <nil>, <name>, <start>, <duration>, <reset>`
    /// Start, duration and reset are accepted but not acted on.
    fn handle_play(&mut self, args: &[Amf0Value]) -> Result<()> {
        for (k, v) in args.iter().enumerate() {
            match v {
                Amf0Value::Number(n) => match k {
                    0 => self.transaction_id = *n as u32,
                    3 => {
                        if *n as i64 != 0 && *n as i64 != -1 {
                            debug!("unrealized play start={}", n);
                        }
                    }
                    4 => {
                        if *n as i64 >= 0 {
                            debug!("unrealized play duration={}", n);
                        }
                    }
                    _ => {}
                },
                Amf0Value::String(s) => self.publish.name = s.clone(),
                Amf0Value::Boolean(_) => debug!("unrealized play reset"),
                _ => {}
            }
        }
        Ok(())
    }

    /// Stream Begin first, then the start status.
    async fn rsp_play(&mut self, cs: &ChunkStream) -> Result<()> {
        self.conn.write_message(&message::stream_begin(1)).await?;

        let mut event = HashMap::new();
        event.insert("level".to_string(), Amf0Value::String(LEVEL_STATUS.to_string()));
        event.insert(
            "code".to_string(),
            Amf0Value::String(CODE_PLAY_START.to_string()),
        );
        event.insert(
            "description".to_string(),
            Amf0Value::String("Started playing stream.".to_string()),
        );

        self.send_command(
            cs.csid,
            cs.stream_id,
            &[
                Amf0Value::String(ON_STATUS.to_string()),
                Amf0Value::Number(0.0),
                Amf0Value::Null,
                Amf0Value::Object(event),
            ],
        )
        .await
    }

    async fn get_stream_length_message(
        &mut self,
        cs: &ChunkStream,
        cmd: &[Amf0Value],
    ) -> Result<()> {
        if cmd.len() <= 1 {
            return Err(Error::command(format!(
                "incomplete getStreamLength command, length={}",
                cmd.len()
            )));
        }

        for v in &cmd[1..] {
            match v {
                Amf0Value::Number(n) => self.transaction_id = *n as u32,
                Amf0Value::String(_) => {
                    // Live streams have no recorded length to look up.
                    self.duration = 0;
                }
                _ => {}
            }
        }

        let duration = self.duration;
        self.send_command(
            cs.csid,
            cs.stream_id,
            &[
                Amf0Value::String(RESP_RESULT.to_string()),
                Amf0Value::Number(self.transaction_id as f64),
                Amf0Value::Null,
                Amf0Value::Number(duration as f64),
            ],
        )
        .await?;

        self.method = GET_STREAM_LENGTH;
        Ok(())
    }

    /// `<deleteStream>, <transaction id: 0>, <nil>, <stream id>`; no
    /// response goes back.
    fn delete_stream_message(&mut self, cmd: &[Amf0Value]) -> Result<()> {
        if cmd.len() <= 1 {
            return Err(Error::command("incomplete deleteStream command"));
        }

        for (k, v) in cmd[1..].iter().enumerate() {
            if let Amf0Value::Number(n) = v {
                match k {
                    0 => {
                        if *n as i64 != 0 {
                            return Err(Error::command("invalid deleteStream transaction id"));
                        }
                    }
                    2 => {
                        if *n as u32 != self.stream_id {
                            return Err(Error::command("invalid stream id"));
                        }
                    }
                    _ => {}
                }
            }
        }

        self.stream_id = 0;
        self.method = DELETE_STREAM;
        Ok(())
    }

    /// `<FCUnpublish>, <transaction id>, <nil>, <stream name>`
    fn fc_unpublish_message(&mut self, cmd: &[Amf0Value]) -> Result<()> {
        if cmd.len() <= 1 {
            return Err(Error::command(format!(
                "incomplete FCUnpublish command, length={}",
                cmd.len()
            )));
        }

        for v in &cmd[1..] {
            match v {
                Amf0Value::Number(n) => self.transaction_id = *n as u32,
                Amf0Value::String(name) => {
                    if *name != self.publish.name {
                        return Err(Error::command(format!(
                            "invalid publish name='{}'",
                            name
                        )));
                    }
                }
                _ => {}
            }
        }

        self.publish = PublishInfo::default();
        self.method = FC_UNPUBLISH;
        Ok(())
    }

    /// Capture `@setDataFrame` / `onMetaData` from a data message.
    fn handle_data_message(&mut self, cs: &ChunkStream) -> Result<()> {
        let body: &[u8] = match cs.type_id {
            MSG_DATA_AMF0 => &cs.data,
            MSG_DATA_AMF3 => {
                if cs.data.len() <= 1 {
                    return Err(Error::protocol("incomplete amf3 data message"));
                }
                &cs.data[1..]
            }
            _ => return Ok(()),
        };

        let cmd = amf::decode_batch(body)?;
        if cmd.is_empty() {
            return Err(Error::command("empty data message"));
        }

        let name = cmd[0]
            .as_str()
            .ok_or_else(|| Error::command("data command name is not a string"))?;

        if name == SET_DATA_FRAME {
            if cmd.len() <= 1 {
                return Err(Error::command("incomplete SetDataFrame command"));
            }
            self.handle_set_data_frame(&cmd[1..])?;
        }

        Ok(())
    }

    fn handle_set_data_frame(&mut self, args: &[Amf0Value]) -> Result<()> {
        let sub = args[0]
            .as_str()
            .ok_or_else(|| Error::command("sub command name is not a string"))?;

        if sub == ON_METADATA {
            if args.len() <= 1 {
                return Err(Error::command("invalid onMetaData"));
            }

            let object = args[1]
                .as_object()
                .ok_or_else(|| Error::command("onMetaData payload is not an object"))?;

            self.publish.metadata = Some(object.clone());
        }

        Ok(())
    }

    async fn send_command(
        &self,
        csid: u32,
        stream_id: u32,
        values: &[Amf0Value],
    ) -> Result<()> {
        let data = amf::encode_batch(values)?;
        let cs = ChunkStream::message(csid, MSG_COMMAND_AMF0, stream_id, 0, &data);

        self.conn.write_message(&cs).await?;
        self.conn.flush().await
    }
}
