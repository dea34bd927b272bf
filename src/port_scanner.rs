/// Módulo de escaneo de sockets de red.
///
/// Lee las tablas de sockets del kernel (`/proc/net/{tcp,tcp6,udp,udp6,unix}`)
/// y atribuye cada socket a su proceso dueño recorriendo `/proc/<pid>/fd`.
/// No filtra nada: devuelve todas las conexiones tal cual las ve el kernel.
use thiserror::Error;

use crate::connection::ConnectionRecord;

/// Errores del listado global de conexiones.
///
/// Ninguno es fatal: quien llama lo registra y continúa con una lista vacía.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("no se pudo leer la tabla /proc/net/{table}: {reason}")]
    Table { table: &'static str, reason: String },

    #[error("no se pudieron enumerar los procesos: {0}")]
    Processes(String),

    #[cfg(not(target_os = "linux"))]
    #[error("plataforma no soportada: {0}")]
    Unsupported(&'static str),
}

/// Fuente de todas las conexiones vivas del sistema.
pub trait ConnectionLister {
    fn list_connections(&self) -> Result<Vec<ConnectionRecord>, ListingError>;
}

#[cfg(target_os = "linux")]
pub use self::linux::ProcfsScanner;

#[cfg(not(target_os = "linux"))]
pub use self::unsupported::UnsupportedScanner;

#[cfg(target_os = "linux")]
mod linux {
    use std::collections::HashMap;
    use std::net::SocketAddr;

    use nix::libc;
    use procfs::net::TcpState;
    use procfs::process::FDTarget;
    use procfs::{ProcError, ProcResult};

    use super::{ConnectionLister, ListingError};
    use crate::connection::{AddressFamily, ConnectionRecord, SocketType, NO_STATUS};

    /// Escáner basado en `/proc`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ProcfsScanner;

    impl ConnectionLister for ProcfsScanner {
        fn list_connections(&self) -> Result<Vec<ConnectionRecord>, ListingError> {
            let owners = socket_owners()?;
            let mut records = Vec::new();

            // TCP y UDP, IPv4 e IPv6. Las tablas *6 faltan si IPv6 está deshabilitado
            for entry in read_table("tcp", procfs::net::tcp(), false)? {
                records.push(inet_record(
                    entry.local_address,
                    entry.remote_address,
                    SocketType::Stream,
                    tcp_status(&entry.state),
                    owner_of(&owners, entry.inode),
                ));
            }
            for entry in read_table("tcp6", procfs::net::tcp6(), true)? {
                records.push(inet_record(
                    entry.local_address,
                    entry.remote_address,
                    SocketType::Stream,
                    tcp_status(&entry.state),
                    owner_of(&owners, entry.inode),
                ));
            }
            for entry in read_table("udp", procfs::net::udp(), false)? {
                records.push(inet_record(
                    entry.local_address,
                    entry.remote_address,
                    SocketType::Datagram,
                    NO_STATUS,
                    owner_of(&owners, entry.inode),
                ));
            }
            for entry in read_table("udp6", procfs::net::udp6(), true)? {
                records.push(inet_record(
                    entry.local_address,
                    entry.remote_address,
                    SocketType::Datagram,
                    NO_STATUS,
                    owner_of(&owners, entry.inode),
                ));
            }

            // Sockets unix: no son IP, pero el listado los incluye igualmente
            for entry in read_table("unix", procfs::net::unix(), false)? {
                records.push(ConnectionRecord {
                    local_address: entry
                        .path
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    local_port: 0,
                    remote_address: String::new(),
                    remote_port: 0,
                    family: AddressFamily::from_raw(libc::AF_UNIX),
                    socket_type: SocketType::from_raw(i32::from(entry.socket_type)),
                    status: NO_STATUS.to_string(),
                    pid: owner_of(&owners, entry.inode),
                });
            }

            log::debug!(
                "{} conexiones leídas, {} sockets con proceso dueño",
                records.len(),
                owners.len()
            );
            Ok(records)
        }
    }

    /// Lee una tabla de `/proc/net`.
    ///
    /// # Arguments
    /// * `table` - Nombre de la tabla, para los mensajes de error
    /// * `result` - Resultado de la lectura hecha por procfs
    /// * `optional` - Si es true, una tabla inexistente cuenta como vacía
    fn read_table<T>(
        table: &'static str,
        result: ProcResult<Vec<T>>,
        optional: bool,
    ) -> Result<Vec<T>, ListingError> {
        match result {
            Ok(entries) => Ok(entries),
            Err(ProcError::NotFound(_)) if optional => {
                log::debug!("/proc/net/{} no existe (¿IPv6 deshabilitado?)", table);
                Ok(Vec::new())
            }
            Err(err) => Err(ListingError::Table {
                table,
                reason: err.to_string(),
            }),
        }
    }

    /// Construye el mapa inodo de socket → PID dueño.
    ///
    /// Recorre los descriptores abiertos de todos los procesos visibles.
    /// Si varios procesos comparten un socket (ej: tras un fork), se queda
    /// con el primero encontrado, que es el de PID más bajo. Los procesos
    /// cuyos descriptores no se pueden leer (sin permisos) se ignoran.
    fn socket_owners() -> Result<HashMap<u64, u32>, ListingError> {
        let processes =
            procfs::process::all_processes().map_err(|e| ListingError::Processes(e.to_string()))?;

        let mut owners = HashMap::new();
        for process in processes.flatten() {
            let pid = match u32::try_from(process.pid()) {
                Ok(pid) => pid,
                Err(_) => continue,
            };
            let fds = match process.fd() {
                Ok(fds) => fds,
                Err(_) => continue,
            };
            for fd_info in fds.flatten() {
                if let FDTarget::Socket(inode) = fd_info.target {
                    owners.entry(inode).or_insert(pid);
                }
            }
        }

        Ok(owners)
    }

    /// PID dueño de un inodo, o 0 si ningún proceso visible lo tiene abierto.
    fn owner_of(owners: &HashMap<u64, u32>, inode: u64) -> u32 {
        owners.get(&inode).copied().unwrap_or(0)
    }

    pub(super) fn inet_record(
        local: SocketAddr,
        remote: SocketAddr,
        socket_type: SocketType,
        status: &str,
        pid: u32,
    ) -> ConnectionRecord {
        let family = match local {
            SocketAddr::V4(_) => AddressFamily::Ipv4,
            SocketAddr::V6(_) => AddressFamily::Ipv6,
        };

        ConnectionRecord {
            local_address: local.ip().to_string(),
            local_port: local.port(),
            remote_address: remote.ip().to_string(),
            remote_port: remote.port(),
            family,
            socket_type,
            status: status.to_string(),
            pid,
        }
    }

    /// Nombre del estado TCP con la nomenclatura del kernel.
    pub(super) fn tcp_status(state: &TcpState) -> &'static str {
        match state {
            TcpState::Established => "ESTABLISHED",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::FinWait1 => "FIN_WAIT1",
            TcpState::FinWait2 => "FIN_WAIT2",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::Listen => "LISTEN",
            TcpState::Closing => "CLOSING",
            TcpState::NewSynRecv => "NEW_SYN_RECV",
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use super::{ConnectionLister, ListingError};
    use crate::connection::ConnectionRecord;

    /// Escáner para plataformas sin `/proc`: siempre falla.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnsupportedScanner;

    impl ConnectionLister for UnsupportedScanner {
        fn list_connections(&self) -> Result<Vec<ConnectionRecord>, ListingError> {
            Err(ListingError::Unsupported(std::env::consts::OS))
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::linux::{inet_record, tcp_status};
    use super::*;
    use crate::connection::{AddressFamily, SocketType, LISTEN_STATUS, NO_STATUS};
    use procfs::net::TcpState;

    #[test]
    fn test_tcp_status_names() {
        assert_eq!(tcp_status(&TcpState::Listen), LISTEN_STATUS);
        assert_eq!(tcp_status(&TcpState::Established), "ESTABLISHED");
        assert_eq!(tcp_status(&TcpState::TimeWait), "TIME_WAIT");
    }

    /// Verifica la construcción de un registro IPv6 desde direcciones del kernel
    #[test]
    fn test_inet_record_ipv6() {
        let record = inet_record(
            "[::]:5353".parse().unwrap(),
            "[::]:0".parse().unwrap(),
            SocketType::Datagram,
            NO_STATUS,
            812,
        );
        assert_eq!(record.family, AddressFamily::Ipv6);
        assert_eq!(record.local_address, "::");
        assert_eq!(record.local_port, 5353);
        assert_eq!(record.remote_port, 0);
        assert_eq!(record.pid, 812);
    }

    #[test]
    fn test_inet_record_ipv4() {
        let record = inet_record(
            "0.0.0.0:8080".parse().unwrap(),
            "0.0.0.0:0".parse().unwrap(),
            SocketType::Stream,
            LISTEN_STATUS,
            0,
        );
        assert_eq!(record.family, AddressFamily::Ipv4);
        assert_eq!(record.local_address, "0.0.0.0");
        assert_eq!(record.status, "LISTEN");
        assert_eq!(record.pid, 0);
    }

    /// Un listener real del proceso de test aparece atribuido a su PID
    #[test]
    fn test_lists_own_tcp_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let records = ProcfsScanner.list_connections().unwrap();
        let found = records.iter().find(|r| {
            r.local_port == port
                && r.socket_type == SocketType::Stream
                && r.family == AddressFamily::Ipv4
        });

        let record = found.expect("el listener debe aparecer en /proc/net/tcp");
        assert_eq!(record.local_address, "127.0.0.1");
        assert_eq!(record.status, LISTEN_STATUS);
        assert_eq!(record.pid, std::process::id());
    }

    #[test]
    fn test_lists_own_udp_socket() {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();

        let records = ProcfsScanner.list_connections().unwrap();
        let record = records
            .iter()
            .find(|r| r.local_port == port && r.socket_type == SocketType::Datagram)
            .expect("el socket debe aparecer en /proc/net/udp");
        assert_eq!(record.remote_port, 0);
        assert_eq!(record.status, NO_STATUS);
        assert_eq!(record.pid, std::process::id());
    }
}
