/// Modelo de datos de las conexiones de red del sistema.
///
/// Define el registro crudo que entrega el listado de conexiones
/// (`ConnectionRecord`) y los enums cerrados que lo describen:
/// familia de direcciones, tipo de socket y protocolo.
use nix::libc;

/// Estado que reporta el kernel para un socket TCP en escucha.
pub const LISTEN_STATUS: &str = "LISTEN";

/// Estado de los sockets que no son orientados a conexión (UDP, unix).
pub const NO_STATUS: &str = "NONE";

/// Familia de direcciones de un socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    /// Cualquier otra familia (AF_UNIX, AF_NETLINK, ...), con su valor crudo
    Other(i32),
}

impl AddressFamily {
    /// Convierte el valor `AF_*` del sistema operativo.
    pub fn from_raw(family: i32) -> Self {
        match family {
            libc::AF_INET => AddressFamily::Ipv4,
            libc::AF_INET6 => AddressFamily::Ipv6,
            other => AddressFamily::Other(other),
        }
    }

    pub fn is_ip(self) -> bool {
        matches!(self, AddressFamily::Ipv4 | AddressFamily::Ipv6)
    }
}

/// Tipo de socket tal como lo clasifica el sistema operativo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    /// SOCK_STREAM (TCP y similares)
    Stream,
    /// SOCK_DGRAM (UDP y similares)
    Datagram,
    /// SOCK_SEQPACKET, SOCK_RAW, ... con su valor crudo
    Other(i32),
}

impl SocketType {
    /// Convierte el valor `SOCK_*` del sistema operativo.
    pub fn from_raw(socket_type: i32) -> Self {
        match socket_type {
            libc::SOCK_STREAM => SocketType::Stream,
            libc::SOCK_DGRAM => SocketType::Datagram,
            other => SocketType::Other(other),
        }
    }
}

/// Etiqueta de protocolo que se muestra para cada endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
    Unknown,
}

impl Protocol {
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Unknown => "UNKNOWN",
        }
    }
}

impl From<SocketType> for Protocol {
    fn from(socket_type: SocketType) -> Self {
        match socket_type {
            SocketType::Stream => Protocol::Tcp,
            SocketType::Datagram => Protocol::Udp,
            SocketType::Other(_) => Protocol::Unknown,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Una conexión o socket vivo del sistema, tal como lo entrega el listado.
///
/// Las direcciones se guardan como texto porque los sockets unix
/// no tienen IP (su dirección local es la ruta del socket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub family: AddressFamily,
    pub socket_type: SocketType,
    /// Estado del kernel; solo tiene sentido en sockets stream
    pub status: String,
    /// PID dueño del socket (0 = no se pudo atribuir a ningún proceso)
    pub pid: u32,
}

impl std::fmt::Display for ConnectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/{:?} {}:{} -> {}:{} [{}] (PID: {})",
            self.family,
            self.socket_type,
            self.local_address,
            self.local_port,
            self.remote_address,
            self.remote_port,
            self.status,
            self.pid
        )
    }
}
