use colloquy_controller::{CancellationToken, ConversationController, SendOutcome};
use colloquy_types::{Result, ThreadId};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Threads,
    New { title: String, first_message: String },
    Open(ThreadId),
    Toggle(ThreadId),
    Stream(bool),
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Send(line.to_string());
        };
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        let arg = arg.trim();

        match name {
            "threads" => Command::Threads,
            "new" => {
                let (title, first) = arg.split_once('|').unwrap_or(("", arg));
                Command::New {
                    title: title.trim().to_string(),
                    first_message: first.trim().to_string(),
                }
            }
            "open" => parse_id(arg).map_or_else(|| invalid("/open <id>"), Command::Open),
            "toggle" => parse_id(arg).map_or_else(|| invalid("/toggle <id>"), Command::Toggle),
            "stream" => match arg {
                "on" => Command::Stream(true),
                "off" => Command::Stream(false),
                _ => invalid("/stream on|off"),
            },
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Invalid(format!("unknown command /{}", other)),
        }
    }
}

fn parse_id(arg: &str) -> Option<ThreadId> {
    arg.parse().ok()
}

fn invalid(usage: &str) -> Command {
    Command::Invalid(format!("usage: {}", usage))
}

const HELP: &str = "\
/threads                      list conversations
/new <title> | <message>      start a conversation
/open <id>                    switch conversation
/toggle <id>                  archive or restore a conversation
/stream on|off                streamed or whole replies
/quit                         leave
anything else is sent as a message
Ctrl-C stops a streaming reply, or leaves at the prompt";

pub async fn run(controller: ConversationController, mut streaming: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_current(&controller);

    loop {
        let line = match next_input(&mut lines, ctrl_c()).await {
            Input::Line(line) => line,
            Input::Closed => break,
            Input::Interrupted => {
                println!();
                break;
            }
        };

        // Flow errors are already in the store's error slot
        match Command::parse(&line) {
            Command::Threads => print_threads(&controller),
            Command::New {
                title,
                first_message,
            } => {
                let _ = controller.create_thread(&title, &first_message).await;
                print_current(&controller);
            }
            Command::Open(id) => {
                let _ = controller.set_current_thread(Some(id)).await;
                print_current(&controller);
            }
            Command::Toggle(id) => {
                let _ = controller.toggle_thread(id).await;
                print_threads(&controller);
            }
            Command::Stream(on) => {
                streaming = on;
                println!("streaming {}", if on { "on" } else { "off" });
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
            Command::Invalid(message) => println!("{}", message),
            Command::Send(text) => {
                let outcome = if streaming {
                    send_streaming(&controller, &text).await
                } else {
                    controller.send_message(&text).await
                };
                if let Ok(SendOutcome::Dropped(reason)) = &outcome {
                    if !text.is_empty() {
                        println!("(not sent: {})", reason);
                    }
                }
                print_last_reply(&controller);
            }
        }
        print_error(&controller);
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Closed,
    Interrupted,
}

/// Once a Ctrl-C listener exists the default handler no longer exits the
/// process, so the prompt races each read against `interrupt`.
async fn next_input<R>(lines: &mut Lines<R>, interrupt: impl Future<Output = ()>) -> Input
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        biased;
        _ = interrupt => Input::Interrupted,
        read = lines.next_line() => match read {
            Ok(Some(line)) => Input::Line(line),
            Ok(None) => Input::Closed,
            Err(e) => {
                tracing::error!(error = %e, "failed to read stdin");
                Input::Closed
            }
        },
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Ctrl-C abandons the reply instead of killing the session
async fn send_streaming(controller: &ConversationController, text: &str) -> Result<SendOutcome> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = controller.send_message_streaming_with(text, cancel).await;
    watcher.abort();
    outcome
}

fn print_threads(controller: &ConversationController) {
    controller.store().read(|state| {
        if state.thread_count() == 0 {
            println!("no conversations yet");
            return;
        }
        let current = state.current_thread_id();
        for thread in state.all_threads() {
            let marker = if Some(thread.id) == current { '*' } else { ' ' };
            let archived = if thread.is_active { "" } else { " (archived)" };
            println!(
                "{} {:>4}  {} [{} messages]{}",
                marker,
                thread.id,
                thread.title,
                thread.messages.len(),
                archived
            );
        }
        println!(
            "{} conversations, {} active, {} messages",
            state.thread_count(),
            state.active_thread_count(),
            state.total_message_count()
        );
    });
}

fn print_current(controller: &ConversationController) {
    controller.store().read(|state| match state.current_thread() {
        Some(thread) => {
            println!("== {} (#{}) ==", thread.title, thread.id);
            for message in &thread.messages {
                println!("{:>9}: {}", message.sender, message.text);
            }
        }
        None => println!("no conversation selected; /new <title> | <message> to start one"),
    });
}

fn print_last_reply(controller: &ConversationController) {
    controller.store().read(|state| {
        if let Some(message) = state.current_thread().and_then(|t| t.last_message()) {
            println!("{:>9}: {}", message.sender, message.text);
        }
    });
}

fn print_error(controller: &ConversationController) {
    if let Some(error) = controller.store().read(|state| state.error().map(str::to_string)) {
        eprintln!("error: {}", error);
    }
}
