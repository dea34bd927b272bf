/// Resolución de endpoints: filtra las conexiones en escucha, las agrupa
/// por proceso dueño y emite un descriptor por cada una.
///
/// Todo lo observable (endpoints, conexiones descartadas, procesos que no
/// se pudieron consultar) pasa por un `Reporter` que se inyecta al construir
/// el resolver. En producción es `LogReporter`; los tests usan uno que graba.
use std::collections::HashMap;

use crate::connection::{ConnectionRecord, Protocol, SocketType, LISTEN_STATUS};
use crate::port_scanner::{ConnectionLister, ListingError};
use crate::process::{LookupError, ProcessInfo, ProcessInspector};

/// Dirección que significa "todas las interfaces"; no se puede conectar a ella
const ANY_ADDRESS: &str = "0.0.0.0";
/// Dirección de loopback que se muestra en su lugar
const LOOPBACK_ADDRESS: &str = "127.0.0.1";

// ─────────────────────────────────────────────────────────────
// Tipos de salida
// ─────────────────────────────────────────────────────────────

/// Endpoint en escucha atribuido a un proceso.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointDescriptor {
    /// Dirección local, con 0.0.0.0 reemplazada por 127.0.0.1
    pub address: String,
    /// Dirección a la que está ligado el socket, sin reescribir
    pub bind_address: String,
    pub port: u16,
    pub protocol: Protocol,
    pub pid: u32,
    pub process_name: String,
    pub process_args: String,
}

impl EndpointDescriptor {
    fn new(connection: &ConnectionRecord, pid: u32, process: &ProcessInfo) -> Self {
        Self {
            address: display_address(&connection.local_address).to_string(),
            bind_address: connection.local_address.clone(),
            port: connection.local_port,
            protocol: Protocol::from(connection.socket_type),
            pid,
            process_name: process.name.clone(),
            process_args: process.cmdline.clone(),
        }
    }
}

impl std::fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}:{} (bind {}) → {} [PID {}] cmd: {}",
            self.protocol,
            self.address,
            self.port,
            self.bind_address,
            self.process_name,
            self.pid,
            self.process_args
        )
    }
}

/// Primer criterio que una conexión no cumplió.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Ni IPv4 ni IPv6
    NotIp,
    /// Ni stream ni datagram
    NotTcpOrUdp,
    /// Socket stream fuera del estado LISTEN
    NotListening,
    /// Socket datagram con puerto remoto fijado (conversación activa)
    HasRemotePort,
    /// El kernel no lo pudo atribuir a ningún proceso
    NoOwner,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NotIp => "no es un socket IP",
            SkipReason::NotTcpOrUdp => "no es TCP ni UDP",
            SkipReason::NotListening => "TCP fuera del estado LISTEN",
            SkipReason::HasRemotePort => "UDP con puerto remoto",
            SkipReason::NoOwner => "sin proceso dueño (PID 0)",
        };
        f.write_str(text)
    }
}

/// Conteos de una pasada del resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub listed: usize,
    pub skipped: usize,
    pub processes_resolved: usize,
    pub processes_failed: usize,
    pub emitted: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} conexiones, {} descartadas, {} procesos resueltos, {} fallidos, {} endpoints",
            self.listed, self.skipped, self.processes_resolved, self.processes_failed, self.emitted
        )
    }
}

// ─────────────────────────────────────────────────────────────
// Reporter: destino de todo lo que el resolver produce
// ─────────────────────────────────────────────────────────────

pub trait Reporter {
    fn listed(&mut self, connections: &[ConnectionRecord]);
    fn listing_failed(&mut self, error: &ListingError);
    fn skipped(&mut self, connection: &ConnectionRecord, reason: SkipReason);
    fn lookup_failed(&mut self, pid: u32, error: &LookupError);
    fn endpoint(&mut self, endpoint: &EndpointDescriptor);
}

/// Reporter de producción: escribe todo con el facade `log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn listed(&mut self, connections: &[ConnectionRecord]) {
        log::info!("Listando {} conexiones", connections.len());
        for connection in connections {
            log::debug!("Conexión: {}", connection);
        }
    }

    fn listing_failed(&mut self, error: &ListingError) {
        log::error!("No se pudieron obtener las conexiones de red: {}", error);
    }

    fn skipped(&mut self, connection: &ConnectionRecord, reason: SkipReason) {
        log::debug!("Descartando conexión ({}): {}", reason, connection);
    }

    fn lookup_failed(&mut self, pid: u32, error: &LookupError) {
        log::warn!("No se pudo examinar el proceso {}: {}", pid, error);
    }

    fn endpoint(&mut self, endpoint: &EndpointDescriptor) {
        log::info!("Endpoint: {}", endpoint);
    }
}

// ─────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────

pub struct EndpointResolver<I, R> {
    inspector: I,
    reporter: R,
}

impl<I: ProcessInspector, R: Reporter> EndpointResolver<I, R> {
    pub fn new(inspector: I, reporter: R) -> Self {
        Self {
            inspector,
            reporter,
        }
    }

    /// Lista las conexiones y las resuelve.
    ///
    /// Si el listado falla se reporta y la pasada sigue con cero conexiones.
    pub fn run<L: ConnectionLister>(&mut self, lister: &L) -> Summary {
        let connections = match lister.list_connections() {
            Ok(connections) => connections,
            Err(err) => {
                self.reporter.listing_failed(&err);
                Vec::new()
            }
        };
        self.resolve(connections)
    }

    /// Filtra, agrupa por PID y emite un descriptor por conexión calificada.
    ///
    /// Si la consulta de un proceso falla, ninguna de sus conexiones se emite;
    /// el resto de grupos no se ve afectado.
    pub fn resolve(&mut self, connections: Vec<ConnectionRecord>) -> Summary {
        self.reporter.listed(&connections);

        let mut summary = Summary {
            listed: connections.len(),
            ..Summary::default()
        };

        let mut by_pid: HashMap<u32, Vec<ConnectionRecord>> = HashMap::new();
        for connection in connections {
            match check_listening(&connection) {
                Ok(()) => by_pid.entry(connection.pid).or_default().push(connection),
                Err(reason) => {
                    summary.skipped += 1;
                    self.reporter.skipped(&connection, reason);
                }
            }
        }

        for (pid, group) in by_pid {
            let process = match self.inspector.lookup(pid) {
                Ok(process) => process,
                Err(err) => {
                    summary.processes_failed += 1;
                    self.reporter.lookup_failed(pid, &err);
                    continue;
                }
            };
            summary.processes_resolved += 1;

            for connection in &group {
                let endpoint = EndpointDescriptor::new(connection, pid, &process);
                self.reporter.endpoint(&endpoint);
                summary.emitted += 1;
            }
        }

        summary
    }
}

/// Decide si una conexión es un socket servidor con proceso dueño.
///
/// Los criterios se evalúan en orden y se devuelve el primero que falla:
/// 1. Familia IPv4 o IPv6
/// 2. Tipo stream o datagram
/// 3. Datagram, o stream en estado LISTEN (UDP no tiene estado)
/// 4. Stream, o datagram con puerto remoto 0 (UDP "escucha" si no tiene par)
/// 5. PID distinto de 0
pub fn check_listening(connection: &ConnectionRecord) -> Result<(), SkipReason> {
    let is_stream = connection.socket_type == SocketType::Stream;
    let is_datagram = connection.socket_type == SocketType::Datagram;

    if !connection.family.is_ip() {
        return Err(SkipReason::NotIp);
    }
    if !is_stream && !is_datagram {
        return Err(SkipReason::NotTcpOrUdp);
    }
    if !is_datagram && connection.status != LISTEN_STATUS {
        return Err(SkipReason::NotListening);
    }
    if !is_stream && connection.remote_port != 0 {
        return Err(SkipReason::HasRemotePort);
    }
    // PID 0: el socket no apareció en los descriptores de ningún proceso
    if connection.pid == 0 {
        return Err(SkipReason::NoOwner);
    }
    Ok(())
}

/// Dirección a la que se puede conectar para llegar al endpoint.
///
/// Solo se reescribe 0.0.0.0; `::` se deja tal cual.
pub fn display_address(address: &str) -> &str {
    if address == ANY_ADDRESS {
        LOOPBACK_ADDRESS
    } else {
        address
    }
}
