use futures::future::{abortable, Aborted};
use std::future::Future;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl-C while waiting for input.
    Interrupted,
    /// stdin reached EOF.
    Closed,
}

/// Terminal input for the interactive session. One Ctrl-C listener lives for
/// the whole session and is shared by prompts and in-flight model calls.
pub struct Console {
    lines: mpsc::UnboundedReceiver<String>,
    interrupt: Arc<Notify>,
}

impl Console {
    pub fn new(lines: mpsc::UnboundedReceiver<String>, interrupt: Arc<Notify>) -> Self {
        Self { lines, interrupt }
    }

    /// Read stdin on its own thread and forward every SIGINT to the console.
    pub fn attach() -> Self {
        let (tx, lines) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let interrupt = Arc::new(Notify::new());
        let notify = interrupt.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                notify.notify_one();
            }
        });
        Self::new(lines, interrupt)
    }

    pub async fn ask(&mut self, prompt: &str) -> Input {
        print!("{prompt} ");
        std::io::stdout().flush().ok();
        tokio::select! {
            line = self.lines.recv() => match line {
                Some(l) => Input::Line(l.trim().to_string()),
                None => Input::Closed,
            },
            _ = self.interrupt.notified() => {
                println!();
                Input::Interrupted
            }
        }
    }

    /// Drive `fut` to completion unless Ctrl-C arrives first.
    pub async fn interruptible<F: Future>(&self, fut: F) -> Result<F::Output, Aborted> {
        let (call, handle) = abortable(fut);
        tokio::pin!(call);
        loop {
            tokio::select! {
                out = &mut call => return out,
                _ = self.interrupt.notified() => handle.abort(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn console() -> (mpsc::UnboundedSender<String>, Arc<Notify>, Console) {
        let (tx, rx) = mpsc::unbounded_channel();
        let interrupt = Arc::new(Notify::new());
        (tx, interrupt.clone(), Console::new(rx, interrupt))
    }

    #[tokio::test]
    async fn lines_are_trimmed_and_eof_closes() {
        let (tx, _int, mut c) = console();
        tx.send("  build a todo app \n".into()).unwrap();
        assert_eq!(c.ask(">").await, Input::Line("build a todo app".into()));
        drop(tx);
        assert_eq!(c.ask(">").await, Input::Closed);
    }

    #[tokio::test]
    async fn ctrl_c_aborts_call_then_still_reaches_prompt() {
        let (_tx, int, mut c) = console();

        int.notify_one();
        let out = c.interruptible(tokio::time::sleep(Duration::from_secs(3600))).await;
        assert!(out.is_err());

        // The same listener keeps working once the turn is over.
        int.notify_one();
        assert_eq!(c.ask(">").await, Input::Interrupted);
        int.notify_one();
        assert_eq!(c.ask("Apply?").await, Input::Interrupted);
    }

    #[tokio::test]
    async fn finished_call_returns_output() {
        let (_tx, _int, c) = console();
        assert_eq!(c.interruptible(async { 7 }).await, Ok(7));
    }
}
