use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RpcError;

/// Write one length-prefixed bincode frame.
pub(crate) async fn send_message<W, M>(conn: &mut W, message: &M) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
    M: Serialize,
{
    let content = bincode::serialize(message)?;
    conn.write_all(&(content.len() as u64).to_be_bytes()).await?;
    conn.write_all(&content).await?;
    conn.flush().await?;
    Ok(())
}

/// Read one length-prefixed bincode frame.
pub(crate) async fn recv_message<R, M>(conn: &mut R) -> Result<M, RpcError>
where
    R: AsyncRead + Unpin,
    M: DeserializeOwned,
{
    let mut len_buf = [0u8; 8];
    conn.read_exact(&mut len_buf).await?;
    let len = u64::from_be_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    conn.read_exact(&mut buf).await?;
    Ok(bincode::deserialize(&buf)?)
}
