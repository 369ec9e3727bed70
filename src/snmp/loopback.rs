//! SNMPv2c агент на loopback UDP для проверки настоящего транспорта.
//!
//! На запрос номер `n` (с единицы) агент отвечает Counter32 со значением
//! `n`: для GET под запрошенным OID, для GET-NEXT под OID с добавленным
//! `.1`. Поведение первых запросов задается сценарием.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use snmp2::{MessageType, Pdu};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Normal,
    /// Ответ уходит с задержкой, следующие запросы обслуживаются сразу.
    Delay(Duration),
    /// Запрос остается без ответа.
    Drop,
    ErrorStatus(u32),
    /// Ответ без varbind.
    Empty,
}

pub struct LoopbackAgent {
    address: String,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl LoopbackAgent {
    pub async fn start(script: Vec<Reply>) -> Self {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let address = socket.local_addr().unwrap().to_string();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let reply = script.get(n - 1).copied().unwrap_or(Reply::Normal);

                let response = match reply {
                    Reply::Drop => continue,
                    Reply::ErrorStatus(status) => response(&buf[..len], n, status, true),
                    Reply::Empty => response(&buf[..len], n, 0, false),
                    Reply::Normal | Reply::Delay(_) => response(&buf[..len], n, 0, true),
                };

                match reply {
                    Reply::Delay(delay) => {
                        let socket = Arc::clone(&socket);
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = socket.send_to(&response, peer).await;
                        });
                    }
                    _ => {
                        let _ = socket.send_to(&response, peer).await;
                    }
                }
            }
        });

        Self {
            address,
            requests,
            task,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for LoopbackAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn response(request: &[u8], n: usize, error_status: u32, with_varbind: bool) -> Vec<u8> {
    let pdu = Pdu::from_bytes(request).unwrap();
    let req_id = pdu.req_id;
    let community = pdu.community.to_vec();
    let next = pdu.message_type == MessageType::GetNextRequest;
    let (oid, _) = pdu.varbinds.clone().next().unwrap();

    let mut name = oid.as_bytes().to_vec();
    if next {
        name.push(1);
    }

    let varbinds = if with_varbind {
        let pair = [tlv(0x06, &name), integer(0x41, n as i64)].concat();
        tlv(0x30, &tlv(0x30, &pair))
    } else {
        tlv(0x30, &[])
    };

    let body = [
        integer(0x02, i64::from(req_id)),
        integer(0x02, i64::from(error_status)),
        integer(0x02, 0),
        varbinds,
    ]
    .concat();

    let message = [integer(0x02, 1), tlv(0x04, &community), tlv(0xa2, &body)].concat();
    tlv(0x30, &message)
}

// короткая форма длины, сообщения агента меньше 128 байт
fn tlv(tag: u8, body: &[u8]) -> Vec<u8> {
    assert!(body.len() < 128);
    let mut out = vec![tag, body.len() as u8];
    out.extend_from_slice(body);
    out
}

fn integer(tag: u8, n: i64) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    tlv(tag, &bytes[start..])
}
