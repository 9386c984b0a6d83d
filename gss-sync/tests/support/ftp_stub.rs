//! Minimal scripted FTP control-channel server on a loopback port.
//!
//! Speaks just enough of RFC 959 for login, TYPE, MKD, CWD, PWD and NOOP.
//! Every command received is recorded with its session number.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone, Default)]
pub struct StubScript {
    /// Close session 0 right after answering TYPE.
    pub close_first_session: bool,
    /// Answer every MKD with 550.
    pub refuse_mkd: bool,
    /// Directories CWD accepts and MKD reports as existing.
    pub existing_dirs: Vec<String>,
}

struct StubState {
    script: StubScript,
    dirs: Mutex<HashSet<String>>,
    commands: Mutex<Vec<(usize, String)>>,
}

pub struct FtpStub {
    addr: String,
    state: Arc<StubState>,
}

impl FtpStub {
    pub fn start(script: StubScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state = Arc::new(StubState {
            dirs: Mutex::new(script.existing_dirs.iter().cloned().collect()),
            script,
            commands: Mutex::new(Vec::new()),
        });

        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for (session, conn) in listener.incoming().enumerate() {
                let Ok(conn) = conn else { break };
                let shared = Arc::clone(&shared);
                thread::spawn(move || serve(session, conn, &shared));
            }
        });

        Self { addr, state }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Arguments of every MKD received, in order.
    pub fn mkd_commands(&self) -> Vec<String> {
        self.commands_named("MKD")
    }

    pub fn sessions(&self) -> usize {
        self.state
            .commands
            .lock()
            .unwrap()
            .iter()
            .map(|(session, _)| *session + 1)
            .max()
            .unwrap_or(0)
    }

    fn commands_named(&self, verb: &str) -> Vec<String> {
        self.state
            .commands
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, line)| line.strip_prefix(verb).map(|arg| arg.trim().to_string()))
            .collect()
    }
}

fn serve(session: usize, conn: TcpStream, state: &StubState) {
    let mut writer = match conn.try_clone() {
        Ok(w) => w,
        Err(_) => return,
    };
    let mut reply = |line: &str| writer.write_all(format!("{line}\r\n").as_bytes()).is_ok();
    if !reply("220 stub ready") {
        return;
    }

    let mut cwd = "/".to_string();
    for line in BufReader::new(conn).lines() {
        let Ok(line) = line else { return };
        let line = line.trim_end_matches('\r').to_string();
        state.commands.lock().unwrap().push((session, line.clone()));
        let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));

        let ok = match verb.to_ascii_uppercase().as_str() {
            "USER" => reply("331 password required"),
            "PASS" => reply("230 logged in"),
            "TYPE" => {
                reply("200 type set");
                if state.script.close_first_session && session == 0 {
                    return;
                }
                true
            }
            "MKD" => {
                let mut dirs = state.dirs.lock().unwrap();
                if state.script.refuse_mkd {
                    reply("550 Permission denied")
                } else if dirs.contains(arg) {
                    reply("550 File exists")
                } else {
                    dirs.insert(arg.to_string());
                    reply(&format!("257 \"{arg}\" created"))
                }
            }
            "CWD" => {
                if arg == "/" || state.dirs.lock().unwrap().contains(arg) {
                    cwd = arg.to_string();
                    reply("250 directory changed")
                } else {
                    reply("550 No such directory")
                }
            }
            "PWD" => reply(&format!("257 \"{cwd}\" is the current directory")),
            "NOOP" => reply("200 ok"),
            "QUIT" => {
                reply("221 bye");
                return;
            }
            _ => reply("502 command not implemented"),
        };
        if !ok {
            return;
        }
    }
}
