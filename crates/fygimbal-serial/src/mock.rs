//! Mock 传输后端
//!
//! [`MockTransport::pair`] 返回一对端点：主机侧的 `MockTransport` 交给驱动，
//! 设备侧的 [`MockDevice`] 由测试持有，用来注入字节流并解析主机写出的包。
//! 任一端被丢弃后，另一端的读写返回 `TransportError::Disconnected`。

use crate::{SplittableTransport, TransportError, TransportReader, TransportWriter};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use fygimbal_protocol::{Packet, PacketReceiver};
use std::time::{Duration, Instant};

/// 主机侧默认读超时
pub const DEFAULT_MOCK_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// 主机侧端点
pub struct MockTransport {
    rx: MockRx,
    tx: MockTx,
}

impl MockTransport {
    /// 创建一对互联的端点
    pub fn pair() -> (MockTransport, MockDevice) {
        let (to_host_tx, to_host_rx) = unbounded();
        let (to_device_tx, to_device_rx) = unbounded();

        let transport = MockTransport {
            rx: MockRx {
                incoming: to_host_rx,
                pending: Vec::new(),
                read_timeout: DEFAULT_MOCK_READ_TIMEOUT,
            },
            tx: MockTx {
                outgoing: to_device_tx,
            },
        };
        let device = MockDevice {
            to_host: to_host_tx,
            from_host: to_device_rx,
            receiver: PacketReceiver::new(),
            chunk_size: None,
        };
        (transport, device)
    }

    /// 设置读超时
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.rx.read_timeout = timeout;
        self
    }
}

impl TransportReader for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.rx.read(buf)
    }
}

impl TransportWriter for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.tx.write_all(bytes)
    }
}

impl SplittableTransport for MockTransport {
    type Reader = MockRx;
    type Writer = MockTx;

    fn split(self) -> Result<(MockRx, MockTx), TransportError> {
        Ok((self.rx, self.tx))
    }
}

/// 主机侧读端
///
/// 每次 `read` 至多返回设备注入的一个块，保留设备侧的分块粒度。
pub struct MockRx {
    incoming: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl TransportReader for MockRx {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.pending.is_empty() {
            match self.incoming.recv_timeout(self.read_timeout) {
                Ok(chunk) => self.pending = chunk,
                Err(RecvTimeoutError::Timeout) => return Err(TransportError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Disconnected),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// 主机侧写端
pub struct MockTx {
    outgoing: Sender<Vec<u8>>,
}

impl TransportWriter for MockTx {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.outgoing
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }
}

/// 设备侧端点（测试中扮演云台）
pub struct MockDevice {
    to_host: Sender<Vec<u8>>,
    from_host: Receiver<Vec<u8>>,
    receiver: PacketReceiver,
    chunk_size: Option<usize>,
}

impl MockDevice {
    /// 设置注入时的分块大小（`Some(1)` 为逐字节），`None` 表示整块注入
    pub fn set_chunk_size(&mut self, chunk_size: Option<usize>) {
        self.chunk_size = chunk_size.filter(|&n| n > 0);
    }

    /// 向主机注入原始字节
    ///
    /// 主机侧已关闭时返回 `false`。
    pub fn inject(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        match self.chunk_size {
            Some(n) => bytes
                .chunks(n)
                .all(|chunk| self.to_host.send(chunk.to_vec()).is_ok()),
            None => self.to_host.send(bytes.to_vec()).is_ok(),
        }
    }

    /// 向主机注入一个编码后的包
    pub fn inject_packet(&self, packet: &Packet) -> bool {
        self.inject(&packet.encode())
    }

    /// 等待主机写出的下一个有效包
    ///
    /// 超时或主机侧已关闭时返回 `None`。
    pub fn recv_packet(&mut self, timeout: Duration) -> Option<Packet> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(packet) = self.receiver.next_packet() {
                return Some(packet);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.from_host.recv_timeout(remaining) {
                Ok(bytes) => {
                    if let Some(packet) = self.receiver.feed(&bytes).next() {
                        return Some(packet);
                    }
                },
                Err(_) => return None,
            }
        }
    }

    /// 取出主机已写出的全部有效包（不阻塞）
    pub fn drain_packets(&mut self) -> Vec<Packet> {
        loop {
            match self.from_host.try_recv() {
                Ok(bytes) => {
                    // 只缓冲，统一在下面解析
                    drop(self.receiver.feed(&bytes));
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        std::iter::from_fn(|| self.receiver.next_packet()).collect()
    }
}
