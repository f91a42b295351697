//! Scripted bot for poking a running arena server.
//!
//! Joins, wanders around, flips mode now and then, shoots at the nearest
//! player it can see and leaves after a while.

use clap::Parser;
use log::{info, warn};
use parking_lot::Mutex;
use rand::Rng;
use shared::codec::{decode_packet, read_frame, write_packet};
use shared::geometry::{angle_between, distance};
use shared::{
    Mode, ObstacleRegistry, Packet, PlayerSnapshot, SessionId, Vec2, OCCLUSION_PROBE_RADIUS,
    OCCLUSION_STEPS, PARTICLE_RANGE, WAVE_RANGE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: String,
    /// Seconds to play before disconnecting
    #[clap(short, long, default_value = "10")]
    duration: u64,
}

/// Picks the closest living player that the current mode can reach.
fn pick_target(
    me: &PlayerSnapshot,
    players: &[PlayerSnapshot],
    obstacles: &ObstacleRegistry,
) -> Option<(SessionId, f32)> {
    let range = match me.mode {
        Mode::Particle => PARTICLE_RANGE,
        Mode::Wave => WAVE_RANGE,
    };

    players
        .iter()
        .filter(|p| p.id != me.id && !p.is_dead())
        .map(|p| (p, distance(me.position(), p.position())))
        .filter(|(_, d)| *d < range)
        .filter(|(p, _)| {
            me.mode == Mode::Wave
                || !obstacles.blocks_line(
                    me.position(),
                    p.position(),
                    OCCLUSION_STEPS,
                    OCCLUSION_PROBE_RADIUS,
                )
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(p, _)| (p.id, angle_between(me.position(), p.position())))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    let (mut reader, mut writer) = stream.into_split();

    let session_id = match read_frame(&mut reader).await? {
        Some(payload) => match decode_packet(&payload)? {
            Packet::Welcome { session_id } => session_id,
            Packet::Disconnected { reason } => {
                warn!("Server refused us: {}", reason);
                return Ok(());
            }
            other => return Err(format!("expected Welcome, got {:?}", other).into()),
        },
        None => return Err("server closed the connection".into()),
    };
    info!("Assigned session id {}", session_id);
    write_packet(&mut writer, &Packet::PlayerJoin).await?;

    // Latest snapshot, kept current by the reader task
    let world: Arc<Mutex<Vec<PlayerSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let reader_world = Arc::clone(&world);
    let reader_task = tokio::spawn(async move {
        while let Ok(Some(payload)) = read_frame(&mut reader).await {
            match decode_packet(&payload) {
                Ok(Packet::PlayerUpdate { players }) => *reader_world.lock() = players,
                Ok(Packet::AttackResolved(event)) if event.target_id == session_id => {
                    info!("Hit by {} for {}", event.attacker_id, event.damage);
                }
                Ok(Packet::AttackResolved(event)) if event.attacker_id == session_id => {
                    info!("Hit {} for {}", event.target_id, event.damage);
                }
                Ok(_) => {}
                Err(e) => warn!("Bad frame from server: {}", e),
            }
        }
        info!("Server closed the connection");
    });

    let obstacles = ObstacleRegistry::arena();
    let mut rng = rand::thread_rng();
    let mut heading: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let mut ticker = interval(Duration::from_millis(100));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut tick: u64 = 0;

    while Instant::now() < deadline {
        ticker.tick().await;
        tick += 1;

        let me = world.lock().iter().find(|p| p.id == session_id).cloned();
        let Some(me) = me else { continue };
        if me.is_dead() {
            continue;
        }

        // Every 2 seconds
        if tick % 20 == 0 {
            write_packet(&mut writer, &Packet::PlayerStateChange { mode: me.mode.toggled() })
                .await?;
            continue;
        }

        heading += rng.gen_range(-0.4..0.4);
        let step = me.mode.speed();
        let target = Vec2::new(
            me.x + heading.cos() * step,
            me.y + heading.sin() * step,
        );
        write_packet(
            &mut writer,
            &Packet::PlayerMove {
                x: target.x,
                y: target.y,
                mode: me.mode,
            },
        )
        .await?;

        let players = world.lock().clone();
        if let Some((target_id, angle)) = pick_target(&me, &players, &obstacles) {
            write_packet(
                &mut writer,
                &Packet::PlayerAttack {
                    target_id,
                    damage: 0,
                    attacker_mode: me.mode,
                    angle,
                },
            )
            .await?;
        }
    }

    write_packet(&mut writer, &Packet::Disconnect).await?;
    info!("Test client finished");
    reader_task.abort();
    Ok(())
}
