use clap::Parser;
use futures_util::{Sink, SinkExt, StreamExt};
use shared::{ClientMessage, Direction, ServerMessage, ServerMessageType};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted player for poking a running server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "ws://127.0.0.1:3003")]
    url: String,

    /// Session to join; a fresh one is created when omitted
    #[arg(short, long)]
    session: Option<String>,

    /// Number of paddle moves to send
    #[arg(short, long, default_value = "10")]
    moves: u32,
}

async fn send<S>(sink: &mut S, message: &ClientMessage) -> Result<(), Box<dyn std::error::Error>>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + 'static,
{
    let text = message.to_json()?;
    println!("Sending: {}", text);
    sink.send(Message::Text(text)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let url = match &args.session {
        Some(id) => format!("{}/game/{}", args.url.trim_end_matches('/'), id),
        None => format!("{}/", args.url.trim_end_matches('/')),
    };

    println!("Connecting to {}", url);
    let (ws, _) = connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    // Print everything the server sends, summarizing state frames
    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    println!("Server closed the connection: {:?}", frame);
                    break;
                }
                _ => continue,
            };
            match ServerMessage::from_json(&text) {
                Ok(message) => match (message.kind, message.data) {
                    (ServerMessageType::State | ServerMessageType::GameOver, Some(state)) => {
                        println!(
                            "{:?} - {} | ball=({:.1}, {:.1}) left={:.1} right={:.1} score={}:{}",
                            message.kind,
                            state.status,
                            state.ball.x,
                            state.ball.y,
                            state.paddles.left.y,
                            state.paddles.right.y,
                            state.scores.left,
                            state.scores.right
                        );
                    }
                    (kind, _) => println!("{:?}: {}", kind, message.message.unwrap_or_default()),
                },
                Err(e) => println!("Failed to parse server message: {}", e),
            }
        }
    });

    send(&mut sink, &ClientMessage::Ping).await?;
    send(&mut sink, &ClientMessage::Start).await?;

    for i in 0..args.moves {
        let direction = if i % 2 == 0 {
            Direction::Up
        } else {
            Direction::Down
        };
        send(
            &mut sink,
            &ClientMessage::Paddle {
                paddle: None,
                direction,
            },
        )
        .await?;
        sleep(Duration::from_millis(500)).await;
    }

    send(
        &mut sink,
        &ClientMessage::Paddle {
            paddle: None,
            direction: Direction::Stop,
        },
    )
    .await?;
    send(&mut sink, &ClientMessage::Stop).await?;
    sleep(Duration::from_millis(200)).await;
    sink.close().await?;

    let _ = timeout(Duration::from_secs(2), reader).await;
    println!("Test client finished");
    Ok(())
}
