use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    network: Network,
    audio: Audio,
    gating: Gating,
    session: Session,
}

#[derive(Deserialize)]
struct Network {
    ws_url: String,
    realtime_beta: String,
}

#[derive(Deserialize)]
struct Audio {
    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
    capture_device: String,
    playback_device: String,
}

#[derive(Deserialize)]
struct Gating {
    reengage_delay_ms: u64,
    reengage_min_percent: u8,
}

#[derive(Deserialize)]
struct Session {
    outbound_capacity: usize,
    empty_read_policy: String,
    #[serde(default)]
    instructions: String,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // 网络配置
    println!("cargo:rustc-env=WS_URL={}", config.network.ws_url);
    println!("cargo:rustc-env=REALTIME_BETA={}", config.network.realtime_beta);

    // 音频配置
    println!("cargo:rustc-env=SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=CHANNELS={}", config.audio.channels);
    println!("cargo:rustc-env=CHUNK_FRAMES={}", config.audio.chunk_frames);
    println!("cargo:rustc-env=CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=PLAYBACK_DEVICE={}", config.audio.playback_device);

    // 回声门限配置
    println!("cargo:rustc-env=REENGAGE_DELAY_MS={}", config.gating.reengage_delay_ms);
    println!("cargo:rustc-env=REENGAGE_MIN_PERCENT={}", config.gating.reengage_min_percent);

    // 会话配置，rustc-env 不能跨行
    println!("cargo:rustc-env=OUTBOUND_CAPACITY={}", config.session.outbound_capacity);
    println!("cargo:rustc-env=EMPTY_READ_POLICY={}", config.session.empty_read_policy);
    println!(
        "cargo:rustc-env=INSTRUCTIONS={}",
        config.session.instructions.replace(['\r', '\n'], " ")
    );
}
