//! # HostObserver 🔎
//!
//! Herramienta de diagnóstico para Linux que muestra qué procesos
//! están escuchando en qué puertos.
//!
//! ## Características
//! - Lista sockets TCP en estado LISTEN y sockets UDP ligados (IPv4 e IPv6)
//! - Atribuye cada socket a su proceso dueño vía `/proc`
//! - Registra dirección, puerto, protocolo, PID, nombre y línea de comandos
//! - Una sola pasada: consulta, informa y termina
//!
//! ## Uso
//! Ejecutar el binario, idealmente como root para ver los procesos de
//! todos los usuarios. El nivel de log se controla con `RUST_LOG`
//! (`RUST_LOG=debug` muestra también las conexiones descartadas).

mod connection;
mod port_scanner;
mod process;
mod resolver;

use resolver::{EndpointResolver, LogReporter};

/// Avisa si el proceso no corre como root.
///
/// Sin permisos no se pueden leer los descriptores de procesos de otros
/// usuarios, así que sus sockets quedan con PID 0 y se descartan.
fn warn_if_unprivileged() {
    if !nix::unistd::geteuid().is_root() {
        log::warn!("Ejecutando sin root - solo se verán los sockets de procesos propios");
    }
}

/// Punto de entrada principal de HostObserver.
///
/// Inicializa el logging, lista las conexiones, resuelve los endpoints
/// y termina. Siempre sale con código 0, aunque falle el listado.
fn main() {
    // Inicializar logging (nivel INFO por defecto, configurable con RUST_LOG)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    log::info!("🔎 HostObserver v{} iniciando...", env!("CARGO_PKG_VERSION"));

    warn_if_unprivileged();

    #[cfg(target_os = "linux")]
    let (lister, inspector) = (port_scanner::ProcfsScanner, process::ProcfsInspector);
    #[cfg(not(target_os = "linux"))]
    let (lister, inspector) = (port_scanner::UnsupportedScanner, NoInspector);

    let mut resolver = EndpointResolver::new(inspector, LogReporter);
    let summary = resolver.run(&lister);

    log::info!("Resumen: {}", summary);
}

/// Sin `/proc` no hay procesos que consultar.
#[cfg(not(target_os = "linux"))]
struct NoInspector;

#[cfg(not(target_os = "linux"))]
impl process::ProcessInspector for NoInspector {
    fn lookup(&self, pid: u32) -> Result<process::ProcessInfo, process::LookupError> {
        Err(process::LookupError::NotFound { pid })
    }
}
