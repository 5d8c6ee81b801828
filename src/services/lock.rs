use std::fs;
use std::path::{Path, PathBuf};

/// Single-instance admission control: a file holding the owning pid. A
/// second instance refuses to start while the recorded pid is still alive;
/// a stale file left by a crashed process is taken over silently.
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self, String> {
        if let Ok(raw) = fs::read_to_string(path) {
            if let Ok(pid) = raw.trim().parse::<u32>() {
                if pid != std::process::id() && pid_alive(pid) {
                    return Err(format!("already running (pid {pid})"));
                }
            }
        }

        fs::write(path, std::process::id().to_string()).map_err(|e| e.to_string())?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}
