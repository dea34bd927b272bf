/// Módulo de inspección de procesos.
///
/// Dado un PID, obtiene el nombre del proceso y su línea de comandos
/// completa. En Linux se lee de `/proc/<pid>/stat` y `/proc/<pid>/cmdline`.
use thiserror::Error;

/// Información de un proceso dueño de uno o más sockets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Nombre del proceso (campo `comm` del kernel)
    pub name: String,
    /// Argumentos de la línea de comandos unidos por espacios
    pub cmdline: String,
}

/// Errores al consultar un proceso. Todos son recuperables:
/// quien llama descarta el proceso y sigue con el resto.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("el proceso {pid} no existe (puede haber terminado)")]
    NotFound { pid: u32 },

    #[error("no se pudo acceder al proceso {pid}: {reason}")]
    Inaccessible { pid: u32, reason: String },

    #[error("no se pudo leer el atributo '{attribute}' del proceso {pid}: {reason}")]
    Attribute {
        pid: u32,
        attribute: &'static str,
        reason: String,
    },
}

/// Consulta de metadatos de procesos por PID.
pub trait ProcessInspector {
    fn lookup(&self, pid: u32) -> Result<ProcessInfo, LookupError>;
}

/// Inspector basado en `/proc`.
#[cfg(target_os = "linux")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsInspector;

#[cfg(target_os = "linux")]
impl ProcessInspector for ProcfsInspector {
    fn lookup(&self, pid: u32) -> Result<ProcessInfo, LookupError> {
        use procfs::process::Process;

        let raw_pid = i32::try_from(pid).map_err(|_| LookupError::NotFound { pid })?;

        let process = Process::new(raw_pid).map_err(|err| match err {
            procfs::ProcError::NotFound(_) => LookupError::NotFound { pid },
            other => LookupError::Inaccessible {
                pid,
                reason: other.to_string(),
            },
        })?;

        let name = process
            .stat()
            .map(|stat| stat.comm)
            .map_err(|err| attribute_error(pid, "name", err))?;

        let cmdline = process
            .cmdline()
            .map(|args| args.join(" "))
            .map_err(|err| attribute_error(pid, "cmdline", err))?;

        Ok(ProcessInfo { name, cmdline })
    }
}

/// Traduce un fallo al leer un atributo del proceso.
///
/// Si el proceso desapareció entre la apertura y la lectura,
/// el kernel responde con NotFound y se trata como tal.
#[cfg(target_os = "linux")]
fn attribute_error(pid: u32, attribute: &'static str, err: procfs::ProcError) -> LookupError {
    match err {
        procfs::ProcError::NotFound(_) => LookupError::NotFound { pid },
        other => LookupError::Attribute {
            pid,
            attribute,
            reason: other.to_string(),
        },
    }
}
