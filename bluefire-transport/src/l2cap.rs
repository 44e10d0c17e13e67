//! L2CAP socket transport (BlueZ kernel sockets)
//!
//! Opens `AF_BLUETOOTH` / `SOCK_SEQPACKET` / `BTPROTO_L2CAP` sockets directly
//! through libc. SEQPACKET keeps HID report boundaries intact, so one `recv`
//! returns exactly one report.
//!
//! # Timeouts
//!
//! Blocking calls are bounded with `SO_RCVTIMEO`. On Linux this also applies
//! to `accept()` on a listening socket, which is what lets the LISTEN-mode
//! accept loop wake up periodically. A timed out call fails with
//! `EAGAIN`/`EWOULDBLOCK` and is reported as `Received::Timeout` / `None`.
//! A receive cut short by a signal is `Received::Interrupted` instead, so it
//! does not count as idle time.

use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::types::{BdAddr, Psm, Received};
use crate::{Channel, Listener, Transport};

/// Receive buffer size; HID reports are far smaller than the L2CAP MTU
const RECV_BUFFER_SIZE: usize = 1024;

/// Pending connection backlog for listening sockets
const LISTEN_BACKLOG: i32 = 1;

/// Transport over kernel L2CAP sockets
#[derive(Debug, Default, Clone)]
pub struct L2capTransport;

impl L2capTransport {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl Transport for L2capTransport {
    fn connect(&self, addr: &BdAddr, psm: Psm) -> Result<Box<dyn Channel>, TransportError> {
        debug!("L2CAP connecting to {} on PSM {}", addr, psm);
        let fd = sys::open_connected(addr, psm)
            .map_err(|source| TransportError::ConnectFailed { psm, source })?;
        Ok(Box::new(L2capChannel { fd, psm }))
    }

    fn listen(&self, addr: &BdAddr, psm: Psm) -> Result<Box<dyn Listener>, TransportError> {
        debug!("L2CAP listening on {} PSM {}", addr, psm);
        let fd = sys::open_listening(addr, psm, LISTEN_BACKLOG)
            .map_err(|source| TransportError::ListenFailed { psm, source })?;
        Ok(Box::new(L2capListener { fd, psm }))
    }

    fn name(&self) -> &str {
        "l2cap"
    }
}

#[cfg(not(target_os = "linux"))]
impl Transport for L2capTransport {
    fn connect(&self, _addr: &BdAddr, _psm: Psm) -> Result<Box<dyn Channel>, TransportError> {
        Err(TransportError::Unsupported)
    }

    fn listen(&self, _addr: &BdAddr, _psm: Psm) -> Result<Box<dyn Listener>, TransportError> {
        Err(TransportError::Unsupported)
    }

    fn name(&self) -> &str {
        "l2cap"
    }
}

#[cfg(target_os = "linux")]
struct L2capListener {
    fd: std::os::fd::OwnedFd,
    psm: Psm,
}

#[cfg(target_os = "linux")]
impl Listener for L2capListener {
    fn psm(&self) -> Psm {
        self.psm
    }

    fn accept(&mut self, timeout: Duration) -> Result<Option<Box<dyn Channel>>, TransportError> {
        match sys::accept(&self.fd, timeout) {
            Ok((fd, peer)) => {
                debug!("Accepted {} on PSM {}", peer, self.psm);
                Ok(Some(Box::new(L2capChannel { fd, psm: self.psm })))
            }
            Err(e) if sys::is_timeout(&e) || sys::is_interrupted(&e) => Ok(None),
            Err(source) => Err(TransportError::AcceptFailed {
                psm: self.psm,
                source,
            }),
        }
    }
}

#[cfg(target_os = "linux")]
struct L2capChannel {
    fd: std::os::fd::OwnedFd,
    psm: Psm,
}

#[cfg(target_os = "linux")]
impl Channel for L2capChannel {
    fn psm(&self) -> Psm {
        self.psm
    }

    fn receive(&mut self, timeout: Duration) -> Result<Received, TransportError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        match sys::recv(&self.fd, &mut buf, timeout) {
            Ok(0) => Ok(Received::PeerClosed),
            Ok(n) => Ok(Received::Data(buf[..n].to_vec())),
            Err(e) if sys::is_timeout(&e) => Ok(Received::Timeout),
            Err(e) if sys::is_interrupted(&e) => Ok(Received::Interrupted),
            Err(e) => Err(TransportError::from(e)),
        }
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        sys::shutdown(&self.fd).map_err(TransportError::from)
    }
}

#[cfg(target_os = "linux")]
mod sys {
    //! Thin libc wrappers; every unsafe call lives here

    use std::io;
    use std::mem;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::time::Duration;

    use crate::types::{BdAddr, Psm};

    /// `BTPROTO_L2CAP` from `<bluetooth/bluetooth.h>`
    const BTPROTO_L2CAP: libc::c_int = 0;

    /// `struct sockaddr_l2` from `<bluetooth/l2cap.h>`
    #[repr(C)]
    struct SockaddrL2 {
        l2_family: libc::sa_family_t,
        /// Little-endian on the wire (`htobs`)
        l2_psm: u16,
        /// `bdaddr_t`, least-significant byte first
        l2_bdaddr: [u8; 6],
        l2_cid: u16,
        l2_bdaddr_type: u8,
    }

    impl SockaddrL2 {
        fn new(addr: &BdAddr, psm: Psm) -> Self {
            Self {
                l2_family: libc::AF_BLUETOOTH as libc::sa_family_t,
                l2_psm: psm.value().to_le(),
                l2_bdaddr: addr.to_le_bytes(),
                l2_cid: 0,
                l2_bdaddr_type: 0,
            }
        }

        fn zeroed() -> Self {
            Self::new(&BdAddr::ANY, Psm(0))
        }

        fn peer(&self) -> BdAddr {
            let mut b = self.l2_bdaddr;
            b.reverse();
            BdAddr(b)
        }
    }

    const ADDR_LEN: libc::socklen_t = mem::size_of::<SockaddrL2>() as libc::socklen_t;

    fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    }

    fn socket() -> io::Result<OwnedFd> {
        let fd = cvt(unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC,
                BTPROTO_L2CAP,
            )
        })?;
        // SAFETY: fd was just returned by socket() and is owned by nobody else
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn set_recv_timeout(fd: &OwnedFd, timeout: Duration) -> io::Result<()> {
        // A zero timeval means "block forever"; never ask for that
        let timeout = timeout.max(Duration::from_micros(1));
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        cvt(unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        })?;
        Ok(())
    }

    pub fn open_connected(addr: &BdAddr, psm: Psm) -> io::Result<OwnedFd> {
        let fd = socket()?;
        let sa = SockaddrL2::new(addr, psm);
        cvt(unsafe {
            libc::connect(
                fd.as_raw_fd(),
                &sa as *const SockaddrL2 as *const libc::sockaddr,
                ADDR_LEN,
            )
        })?;
        Ok(fd)
    }

    pub fn open_listening(addr: &BdAddr, psm: Psm, backlog: i32) -> io::Result<OwnedFd> {
        let fd = socket()?;
        let sa = SockaddrL2::new(addr, psm);
        cvt(unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &sa as *const SockaddrL2 as *const libc::sockaddr,
                ADDR_LEN,
            )
        })?;
        cvt(unsafe { libc::listen(fd.as_raw_fd(), backlog) })?;
        Ok(fd)
    }

    pub fn accept(fd: &OwnedFd, timeout: Duration) -> io::Result<(OwnedFd, BdAddr)> {
        set_recv_timeout(fd, timeout)?;
        let mut sa = SockaddrL2::zeroed();
        let mut len = ADDR_LEN;
        let client = cvt(unsafe {
            libc::accept4(
                fd.as_raw_fd(),
                &mut sa as *mut SockaddrL2 as *mut libc::sockaddr,
                &mut len,
                libc::SOCK_CLOEXEC,
            )
        })?;
        // SAFETY: accept4() returned a fresh descriptor
        let client = unsafe { OwnedFd::from_raw_fd(client) };
        Ok((client, sa.peer()))
    }

    pub fn recv(fd: &OwnedFd, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        set_recv_timeout(fd, timeout)?;
        let n = unsafe {
            libc::recv(
                fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    pub fn shutdown(fd: &OwnedFd) -> io::Result<()> {
        cvt(unsafe { libc::shutdown(fd.as_raw_fd(), libc::SHUT_RDWR) })?;
        Ok(())
    }

    /// `SO_RCVTIMEO` expiry
    pub fn is_timeout(e: &io::Error) -> bool {
        matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
    }

    /// `EINTR`: the wait ended early, not because the timeout ran out
    pub fn is_interrupted(e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::Interrupted
    }

}
