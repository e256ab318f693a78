use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

const WS_PORTS: [u16; 10] = [6463, 6464, 6465, 6466, 6467, 6468, 6469, 6470, 6471, 6472];
const IPC_SLOTS: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];

const OPCODE_HANDSHAKE: i32 = 0;
const OPCODE_FRAME: i32 = 1;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[cfg(unix)]
type IpcStream = tokio::net::UnixStream;
#[cfg(windows)]
type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

/// Local Discord endpoint: IPC socket/pipe preferred, websocket fallback.
pub(crate) enum Transport {
    Ipc(IpcStream),
    Ws(Ws),
}

impl Transport {
    /// Tries every IPC slot, then every local websocket port, handshaking
    /// with the given application id.
    pub(crate) async fn connect(app_id: &str) -> Option<Self> {
        if let Some(ipc) = connect_ipc(app_id).await {
            return Some(Self::Ipc(ipc));
        }
        if let Some(ws) = connect_ws(app_id).await {
            return Some(Self::Ws(ws));
        }
        None
    }

    /// Sends one command frame and returns the raw response bytes.
    pub(crate) async fn send_command(&mut self, command: &serde_json::Value) -> Result<Vec<u8>> {
        match self {
            Self::Ipc(stream) => {
                write_frame(stream, OPCODE_FRAME, command.to_string().as_bytes()).await?;
                let (_, raw) = read_frame(stream).await?;
                Ok(raw)
            }
            Self::Ws(ws) => {
                ws.send(Message::Text(command.to_string()))
                    .await
                    .context("failed sending discord ws message")?;
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => Ok(text.into_bytes()),
                    Some(Ok(Message::Binary(bin))) => Ok(bin),
                    Some(Ok(_)) => Ok(Vec::new()),
                    Some(Err(err)) => Err(anyhow!("discord ws receive failed: {err}")),
                    None => Err(anyhow!("discord ws closed")),
                }
            }
        }
    }
}

async fn connect_ipc(app_id: &str) -> Option<IpcStream> {
    for slot in IPC_SLOTS {
        let Some(mut stream) = open_ipc_slot(slot).await else {
            continue;
        };
        let handshake = json!({ "v": 1, "client_id": app_id }).to_string();
        if write_frame(&mut stream, OPCODE_HANDSHAKE, handshake.as_bytes())
            .await
            .is_err()
        {
            continue;
        }
        if read_frame(&mut stream).await.is_ok() {
            debug!(slot, "connected to discord ipc");
            return Some(stream);
        }
    }
    None
}

async fn connect_ws(app_id: &str) -> Option<Ws> {
    for port in WS_PORTS {
        let url = Url::parse(&format!("ws://127.0.0.1:{port}/?v=1&client_id={app_id}")).ok()?;
        match connect_async(url.as_str()).await {
            Ok((mut ws, _)) => {
                let handshake = json!({ "v": 1, "client_id": app_id }).to_string();
                if ws.send(Message::Text(handshake)).await.is_err() {
                    continue;
                }
                if ws.next().await.is_some() {
                    debug!(port, "connected to discord rpc websocket");
                    return Some(ws);
                }
            }
            Err(err) => {
                debug!(port, error = %err, "discord ws connect failed");
            }
        }
    }
    None
}

#[cfg(unix)]
async fn open_ipc_slot(slot: u8) -> Option<IpcStream> {
    use std::path::PathBuf;

    let mut paths: Vec<PathBuf> = Vec::new();
    if let Ok(tmpdir) = std::env::var("TMPDIR") {
        paths.push(PathBuf::from(tmpdir).join(format!("discord-ipc-{slot}")));
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        paths.push(PathBuf::from(runtime_dir).join(format!("discord-ipc-{slot}")));
    }
    paths.push(PathBuf::from(format!("/tmp/discord-ipc-{slot}")));
    paths.push(PathBuf::from(format!("/private/tmp/discord-ipc-{slot}")));

    for path in paths {
        if let Ok(stream) = tokio::net::UnixStream::connect(&path).await {
            return Some(stream);
        }
    }
    None
}

#[cfg(windows)]
async fn open_ipc_slot(slot: u8) -> Option<IpcStream> {
    use tokio::net::windows::named_pipe::ClientOptions;
    let path = format!(r"\\?\pipe\discord-ipc-{}", slot);
    ClientOptions::new().open(&path).ok()
}

async fn write_frame<S>(stream: &mut S, opcode: i32, payload: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut frame = Vec::with_capacity(8 + payload.len());
    frame.extend_from_slice(&opcode.to_le_bytes());
    frame.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame<S>(stream: &mut S) -> Result<(i32, Vec<u8>)>
where
    S: AsyncRead + Unpin,
{
    let mut hdr = [0u8; 8];
    stream.read_exact(&mut hdr).await?;

    let opcode = i32::from_le_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]);
    let len = i32::from_le_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]);
    if len < 0 {
        return Err(anyhow!("invalid discord ipc frame length"));
    }

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    Ok((opcode, payload))
}
