//! Process-table lookup for engine instances.
//!
//! Instances are found by command line: a process matches when its joined
//! argv contains both the program fragment and the instance fragment. The
//! calling process, including any of its threads, is never a match.

use sysinfo::{Pid, ProcessRefreshKind, Signal, System, UpdateKind};

/// A structured view of one process-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cmdline: Vec<String>,
}

impl ProcessInfo {
    /// Both fragments must appear in the space-joined argv.
    pub fn matches(&self, program: &str, instance: &str) -> bool {
        let joined = self.cmdline.join(" ");
        joined.contains(program) && joined.contains(instance)
    }
}

/// Read and signal the OS process table.
pub trait ProcessInspector {
    fn current_pid(&self) -> u32;

    /// Every id that refers to the calling process: its pid plus its
    /// thread ids where the platform exposes them.
    fn own_ids(&self) -> Vec<u32> {
        vec![self.current_pid()]
    }

    /// Snapshot of every readable process.
    fn processes(&self) -> Vec<ProcessInfo>;

    /// Ask `pid` to terminate. `false` when the process is already gone.
    fn terminate(&self, pid: u32) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateStatus {
    Terminated { pids: Vec<u32> },
    NotFound,
}

/// Every process except our own whose command line names both fragments.
pub fn find<I>(inspector: &I, program: &str, instance: &str) -> Vec<ProcessInfo>
where
    I: ProcessInspector + ?Sized,
{
    let own = inspector.own_ids();
    inspector
        .processes()
        .into_iter()
        .filter(|p| !own.contains(&p.pid) && p.matches(program, instance))
        .collect()
}

/// Signal every match once. The caller re-checks after its own delay.
pub fn terminate<I>(inspector: &I, program: &str, instance: &str) -> TerminateStatus
where
    I: ProcessInspector + ?Sized,
{
    let mut pids = Vec::new();
    for process in find(inspector, program, instance) {
        if inspector.terminate(process.pid) {
            tracing::info!(
                pid = process.pid,
                cmdline = %process.cmdline.join(" "),
                "terminated engine process"
            );
            pids.push(process.pid);
        } else {
            tracing::debug!(pid = process.pid, "process vanished before terminate");
        }
    }
    if pids.is_empty() {
        TerminateStatus::NotFound
    } else {
        TerminateStatus::Terminated { pids }
    }
}

// ---------------------------------------------------------------------------
// sysinfo-backed inspector
// ---------------------------------------------------------------------------

/// Production inspector over the `sysinfo` process table.
#[derive(Debug, Default)]
pub struct SysinfoInspector;

impl SysinfoInspector {
    pub fn new() -> Self {
        Self
    }

    fn snapshot() -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessRefreshKind::new().with_cmd(UpdateKind::Always));
        system
    }
}

impl ProcessInspector for SysinfoInspector {
    fn current_pid(&self) -> u32 {
        std::process::id()
    }

    fn own_ids(&self) -> Vec<u32> {
        let own = self.current_pid();
        let system = Self::snapshot();
        let mut ids = vec![own];
        if let Some(tasks) = system.process(Pid::from_u32(own)).and_then(|p| p.tasks()) {
            ids.extend(tasks.iter().map(|tid| tid.as_u32()));
        }
        ids
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        let system = Self::snapshot();
        system
            .processes()
            .values()
            // On Linux every thread is listed as well; signalling a thread id
            // reaches its whole thread group, so only group leaders count.
            .filter(|p| p.thread_kind().is_none())
            // Entries without a readable command line are skipped.
            .filter(|p| !p.cmd().is_empty())
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string(),
                cmdline: p.cmd().to_vec(),
            })
            .collect()
    }

    fn terminate(&self, pid: u32) -> bool {
        let system = Self::snapshot();
        match system.process(Pid::from_u32(pid)) {
            Some(process) => process
                .kill_with(Signal::Term)
                .unwrap_or_else(|| process.kill()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeTable {
        own: u32,
        entries: Vec<ProcessInfo>,
        signalled: RefCell<Vec<u32>>,
    }

    impl ProcessInspector for FakeTable {
        fn current_pid(&self) -> u32 {
            self.own
        }

        fn processes(&self) -> Vec<ProcessInfo> {
            self.entries.clone()
        }

        fn terminate(&self, pid: u32) -> bool {
            self.signalled.borrow_mut().push(pid);
            pid != 99
        }
    }

    fn entry(pid: u32, cmdline: &str) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: cmdline.split(' ').next().unwrap_or_default().to_string(),
            cmdline: cmdline.split(' ').map(str::to_string).collect(),
        }
    }

    fn table() -> FakeTable {
        FakeTable {
            own: 10,
            entries: vec![
                entry(10, "simm stop --lib gsm /opt/bin/connect gsm.connect"),
                entry(11, "/opt/bin/connect /opt/libraries/gsm/gsm.connect -a 7"),
                entry(12, "/opt/bin/connect /opt/libraries/umts/umts.connect"),
                entry(13, "vim gsm.connect"),
                entry(99, "/opt/bin/connect gsm.connect"),
            ],
            signalled: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn find_requires_both_fragments_and_skips_self() {
        let found: Vec<u32> = find(&table(), "bin/connect", "gsm.connect")
            .into_iter()
            .map(|p| p.pid)
            .collect();
        assert_eq!(found, vec![11, 99]);
    }

    #[test]
    fn terminate_never_signals_own_pid() {
        let table = table();
        let status = terminate(&table, "bin/connect", "gsm.connect");
        assert!(!table.signalled.borrow().contains(&10));
        // pid 99 vanished between listing and signalling.
        assert_eq!(status, TerminateStatus::Terminated { pids: vec![11] });
    }

    #[test]
    fn terminate_without_matches() {
        let table = table();
        assert_eq!(
            terminate(&table, "bin/connect", "lte.connect"),
            TerminateStatus::NotFound
        );
        assert!(table.signalled.borrow().is_empty());
    }

    #[test]
    fn sysinfo_inspector_sees_this_process_but_find_excludes_it() {
        let inspector = SysinfoInspector::new();
        let own = inspector.current_pid();
        let exe = std::env::args().next().unwrap_or_default();
        assert!(find(&inspector, &exe, &exe).iter().all(|p| p.pid != own));
    }

    #[test]
    fn matches_spans_argv_elements() {
        let info = entry(5, "/opt/bin/connect /opt/libraries/gsm/gsm.connect -a 7");
        assert!(info.matches("bin/connect", "gsm.connect"));
        assert!(info.matches("connect /opt", "-a 7"));
        assert!(!info.matches("bin/connect", "umts.connect"));
    }

    #[test]
    fn own_thread_ids_are_never_matches() {
        struct Threaded(FakeTable);

        impl ProcessInspector for Threaded {
            fn current_pid(&self) -> u32 {
                self.0.own
            }

            fn own_ids(&self) -> Vec<u32> {
                vec![10, 20, 21]
            }

            fn processes(&self) -> Vec<ProcessInfo> {
                let mut entries = self.0.processes();
                entries.push(entry(20, "simm run /opt/bin/connect gsm.connect"));
                entries.push(entry(21, "simm run /opt/bin/connect gsm.connect"));
                entries
            }

            fn terminate(&self, pid: u32) -> bool {
                self.0.terminate(pid)
            }
        }

        let table = Threaded(table());
        let status = terminate(&table, "bin/connect", "gsm.connect");
        assert_eq!(status, TerminateStatus::Terminated { pids: vec![11] });
        let signalled = table.0.signalled.borrow();
        assert!(signalled.iter().all(|pid| ![10, 20, 21].contains(pid)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn sysinfo_inspector_never_returns_own_threads() {
        use std::sync::mpsc;

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            let _ = done_rx.recv();
        });

        let own_tasks: Vec<u32> = std::fs::read_dir("/proc/self/task")
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().parse().unwrap())
            .collect();
        assert!(own_tasks.len() >= 2);

        let inspector = SysinfoInspector::new();
        let own_ids = inspector.own_ids();
        let listed: Vec<u32> = inspector.processes().iter().map(|p| p.pid).collect();
        let exe = std::env::args().next().unwrap_or_default();
        let found: Vec<u32> = find(&inspector, &exe, &exe).iter().map(|p| p.pid).collect();

        done_tx.send(()).unwrap();
        worker.join().unwrap();

        let own = std::process::id();
        for tid in own_tasks.iter().filter(|tid| **tid != own) {
            assert!(!listed.contains(tid), "thread {tid} listed as a process");
        }
        assert!(found.iter().all(|pid| !own_tasks.contains(pid)), "{found:?}");
        assert!(own_ids.contains(&own));
    }
}
