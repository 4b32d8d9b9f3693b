//! # Framing Over Real Sockets
//!
//! Frames cut across several TCP writes must decode exactly as if they had
//! arrived in one piece, both in the codec and at the node's server.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::fixtures::*;
    use ln_05_wire_codec::{decode, encode, receive, send, Frame, WireConfig};
    use node_runtime::InboundServer;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_header_and_payload_split_across_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let writer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"0000000007").await.unwrap();
            stream.write_all(b"\"he").await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            stream.write_all(b"llo\"").await.unwrap();
            stream.flush().await.unwrap();
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = decode(&mut stream, Duration::from_secs(2)).await.unwrap();
        writer.await.unwrap();

        assert_eq!(frame, Frame::Payload(json!("hello")));
        assert_eq!(encode("hello").unwrap(), b"0000000007\"hello\"".to_vec());
    }

    #[tokio::test]
    async fn test_server_reassembles_split_command() {
        let node = TestNode::open();
        let server = InboundServer::bind(node.ctx.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = watch::channel(false);
        tokio::spawn(server.run(stopped));

        let frame = encode("getversion").unwrap();
        let (head, tail) = frame.split_at(6);
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(head).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream.write_all(tail).await.unwrap();

        let reply = receive(&mut stream, &WireConfig::for_testing()).await.unwrap();
        assert_eq!(reply.as_str(), Some("mainnet0001"));

        send(&mut stream, "getversion").await.unwrap();
        let again = receive(&mut stream, &WireConfig::for_testing()).await.unwrap();
        assert_eq!(again.into_value(), json!("mainnet0001"));
        stop.send(true).unwrap();
    }
}
