use duplex_voice::audio::{AlsaBackend, AlsaConfig};
use duplex_voice::protocol::ClientEvent;
use duplex_voice::session::{EventSink, SessionConfig, SessionController, SessionEvent};
use duplex_voice::transport::TransportSink;
use duplex_voice::transport::websocket;
use duplex_voice::{Config, SessionError, SessionState};
use tokio::signal;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志，默认 info 级别
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 加载配置：编译期默认值 + 环境变量覆盖
    let config = Config::from_env()?;
    config.require_api_key()?;

    // 会话开始前传输必须已连接
    let (mut sink, source) = websocket::connect(&config).await?;

    if let Some(instructions) = config.instructions.clone() {
        let kickoff = ClientEvent::response_create(Some(instructions)).to_json()?;
        sink.send_text(kickoff).await?;
        log::info!("Sent initial instructions");
    }

    let (tx_event, mut rx_event) = mpsc::unbounded_channel::<SessionEvent>();
    let session = SessionController::new(SessionConfig::from(&config), EventSink::new(tx_event));
    let backend = AlsaBackend::new(AlsaConfig::from(&config));
    session.start(Box::new(backend), Box::new(sink), Box::new(source))?;

    println!("Session {} started. Speak any time; Ctrl+C to end.", session.id());

    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                println!("Received Ctrl+C, shutting down...");
                break;
            }

            Some(event) = rx_event.recv() => {
                match event {
                    SessionEvent::StateChanged(state) => {
                        println!("Session {}", state);
                        if state == SessionState::Stopped {
                            break;
                        }
                    }
                    SessionEvent::GateChanged(decision) => {
                        log::debug!("Gate: {:?}", decision);
                    }
                    SessionEvent::AudioDone => println!("AI finished speaking"),
                    SessionEvent::Text(text) => println!("AI: {}", text),
                    SessionEvent::ServerError(message) => eprintln!("Server error: {}", message),
                }
            }
        }
    }

    let report = match session.stop().await {
        Ok(report) => report,
        Err(SessionError::Device(e)) => {
            eprintln!("Audio devices did not stop cleanly: {}", e);
            session.report().ok_or_else(|| anyhow::anyhow!("session has no final report"))?
        }
        Err(e) => return Err(e.into()),
    };

    let stats = report.stats;
    println!(
        "Session ended ({}{}). sent {} blocks, suppressed {}, dropped {}",
        report.cause,
        if report.device_error.is_some() { ", device stop failed" } else { "" },
        stats.blocks_sent,
        stats.blocks_suppressed,
        stats.blocks_dropped,
    );
    println!("Received {} bytes, {} underruns", stats.inbound_bytes, stats.underruns);
    Ok(())
}
