//! PTY Switchboard (C10): runs the child package-manager process under a pseudo
//! terminal so a synchronous malware-confirmation prompt can interrupt live TTY output
//! without corrupting it.
//!
//! Active only in proxy mode with an interactive stdin (§4.10). In non-interactive
//! mode the caller should run the child directly and treat SUSPICIOUS as a deny.

use crate::error::{ProxyError, ProxyResult};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::warn;

/// Whether the raw keystroke stream currently flows to the child PTY (`Raw`, the
/// default) or has been diverted to the confirmation prompt (`Cooked`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    Raw,
    Cooked,
}

/// Output router (§4.10, "Output path"): `live` writes straight through to stdout,
/// `paused` buffers until `resume` flushes it. A single mutex guards the flag and
/// buffer together so a writer never observes a torn state.
pub struct OutputRouter {
    state: Mutex<RouterState>,
}

struct RouterState {
    live: bool,
    buffer: Vec<u8>,
}

impl Default for OutputRouter {
    fn default() -> Self {
        Self {
            state: Mutex::new(RouterState { live: true, buffer: Vec::new() }),
        }
    }
}

impl OutputRouter {
    pub fn write_chunk(&self, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if state.live {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(data);
            let _ = stdout.flush();
        } else {
            state.buffer.extend_from_slice(data);
        }
    }

    pub fn pause(&self) {
        self.state.lock().unwrap().live = false;
    }

    /// Flush anything buffered while paused, then switch back to `live`.
    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.buffer.is_empty() {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&state.buffer);
            let _ = stdout.flush();
            state.buffer.clear();
        }
        state.live = true;
    }
}

/// Input routing destination: either the child PTY's writer (default) or the prompt
/// pipe that feeds the confirmation UI's scanner. Implemented as an atomic flag over
/// two fixed channels rather than a literal atomic pointer, since the two sinks are
/// known up front and never reallocated.
struct InputRouter {
    to_prompt: AtomicBool,
    pty_tx: mpsc::UnboundedSender<u8>,
    prompt_tx: mpsc::UnboundedSender<u8>,
}

impl InputRouter {
    fn route(&self, byte: u8) {
        if self.to_prompt.load(Ordering::Acquire) {
            let _ = self.prompt_tx.send(byte);
        } else {
            let _ = self.pty_tx.send(byte);
        }
    }

    fn switch_to_prompt(&self) {
        self.to_prompt.store(true, Ordering::Release);
    }

    fn switch_to_pty(&self) {
        self.to_prompt.store(false, Ordering::Release);
    }
}

/// A reader the UI's confirmation prompt can read from while input is diverted.
pub struct PromptReader {
    rx: mpsc::UnboundedReceiver<u8>,
}

impl PromptReader {
    /// Read one line (up to and including `\n`) from the diverted stdin stream.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = Vec::new();
        while let Some(byte) = self.rx.recv().await {
            if byte == b'\n' {
                break;
            }
            line.push(byte);
        }
        if line.is_empty() && self.rx.is_closed() {
            return None;
        }
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

/// A cheaply-cloneable handle to the switchboard's input/output routing, usable from
/// any task that needs to pause the child's output for a confirmation prompt without
/// owning the child process itself (`PtySwitchboard::wait` is `&self`-incompatible with
/// sharing across threads since the underlying PTY master isn't `Sync`).
#[derive(Clone)]
pub struct InteractionHandle {
    output: Arc<OutputRouter>,
    input: Arc<InputRouter>,
    mode: Arc<Mutex<TerminalMode>>,
}

impl InteractionHandle {
    /// §4.10 "Confirmation protocol", the `BeforeInteraction` half: pause output,
    /// switch to Cooked, force cursor visibility, and divert stdin to the prompt.
    pub fn before_interaction(&self) {
        self.output.pause();
        *self.mode.lock().unwrap() = TerminalMode::Cooked;
        let _ = crossterm::terminal::disable_raw_mode();
        print!("\u{1b}[?25h");
        let _ = std::io::stdout().flush();
        self.input.switch_to_prompt();
    }

    /// The `AfterInteraction` half: restore Raw mode, flip stdin back to the PTY, and
    /// resume buffered output.
    pub fn after_interaction(&self) {
        self.input.switch_to_pty();
        let _ = crossterm::terminal::enable_raw_mode();
        *self.mode.lock().unwrap() = TerminalMode::Raw;
        self.output.resume();
    }

    pub fn mode(&self) -> TerminalMode {
        *self.mode.lock().unwrap()
    }
}

pub struct PtySwitchboard {
    master: Box<dyn MasterPty + Send>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    interaction: InteractionHandle,
}

impl PtySwitchboard {
    /// Spawn `exe args...` under a fresh PTY and start the input/output pump tasks.
    /// The stdin reader is the single reader of `std::io::stdin()` for the process's
    /// lifetime (§4.10, "Input path"). Returns the switchboard (for `wait`/`resize`),
    /// a cloneable [`InteractionHandle`] for the confirmation-prompt pairing, and the
    /// [`PromptReader`] the prompt itself reads diverted keystrokes from.
    pub fn spawn(exe: &str, args: &[String]) -> ProxyResult<(Self, InteractionHandle, PromptReader)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| ProxyError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(exe);
        cmd.args(args);
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ProxyError::Pty(e.to_string()))?;
        drop(pair.slave);

        let mut pty_writer = pair
            .master
            .take_writer()
            .map_err(|e| ProxyError::Pty(e.to_string()))?;
        let mut pty_reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ProxyError::Pty(e.to_string()))?;

        let output = Arc::new(OutputRouter::default());
        let (pty_tx, mut pty_rx) = mpsc::unbounded_channel::<u8>();
        let (prompt_tx, prompt_rx) = mpsc::unbounded_channel::<u8>();
        let input = Arc::new(InputRouter { to_prompt: AtomicBool::new(false), pty_tx, prompt_tx });

        // Output pump: copies PTY output to the router, one blocking read loop on a
        // dedicated thread (portable-pty's reader is synchronous).
        let output_for_pump = Arc::clone(&output);
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match pty_reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => output_for_pump.write_chunk(&buf[..n]),
                    Err(e) => {
                        warn!(error = %e, "pty output reader exiting");
                        break;
                    }
                }
            }
        });

        // Input pump: writes whatever the router hands it into the PTY master.
        tokio::spawn(async move {
            while let Some(byte) = pty_rx.recv().await {
                if pty_writer.write_all(&[byte]).is_err() {
                    break;
                }
                let _ = pty_writer.flush();
            }
        });

        // The single stdin reader for the process's lifetime. Not cancellable —
        // `Read::read` on stdin is a blocking syscall; process exit reclaims it
        // (§5, "Suspension/blocking points", point (c)).
        let input_for_stdin = Arc::clone(&input);
        std::thread::spawn(move || {
            let mut stdin = std::io::stdin();
            let mut buf = [0u8; 1];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => input_for_stdin.route(buf[0]),
                    Err(_) => break,
                }
            }
        });

        let interaction = InteractionHandle { output, input, mode: Arc::new(Mutex::new(TerminalMode::Raw)) };
        let switchboard = Self {
            master: pair.master,
            child: Mutex::new(child),
            interaction: interaction.clone(),
        };
        Ok((switchboard, interaction, PromptReader { rx: prompt_rx }))
    }

    pub fn mode(&self) -> TerminalMode {
        self.interaction.mode()
    }

    pub fn resize(&self, rows: u16, cols: u16) -> ProxyResult<()> {
        self.master
            .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| ProxyError::Pty(e.to_string()))
    }

    /// Block until the child exits. The terminal is restored to Cooked **before** this
    /// returns, so the shell is never left in Raw mode (§4.10, "Exit handling").
    pub fn wait(&self) -> ProxyResult<i32> {
        let status = self
            .child
            .lock()
            .unwrap()
            .wait()
            .map_err(|e| ProxyError::Pty(e.to_string()))?;
        let _ = crossterm::terminal::disable_raw_mode();
        Ok(status.exit_code() as i32)
    }
}

/// Whether the confirmation UI should run the interactive (PTY-backed) flow, per
/// §4.10: "Active only in proxy mode when stdin is an interactive terminal."
pub fn stdin_is_interactive() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}
