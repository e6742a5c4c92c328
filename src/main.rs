// What you SEE:
// • Live camera, cropped and scaled on the host like an ISP would.
// • FPV HUD on top: crosshair, battery, link quality, flight mode, zoom line.
// • + / - zoom, arrows pan and tilt, 0 resets.
// • 1..4 glide to 1x/2x/4x/8x over the configured transition time.
// • F follows a simulated target, M cycles flight mode, H toggles the HUD.
// • ESC quits.
//
// Optional first argument: path to a JSON settings file.

mod camera;
mod gamma;
mod window;

use std::time::{Duration, Instant};

use camera::SoftwareIsp;
use fpv_hud::eptz::Target;
use fpv_hud::fpv::CROSSHAIR_COLOR;
use fpv_hud::types::WHITE;
use fpv_hud::{
    EptzController, Error, FpvOverlay, OverlaySink, Rect, SensorControl, Settings, Shape, Tracker,
    Transform, Transition,
};
use image::Rgba;
use log::{info, warn};
use minifb::Key;
use window::Display;

const FLIGHT_MODES: [&str; 3] = ["ANGLE", "HORIZON", "ACRO"];
const ZOOM_PRESETS: [(Key, f64); 4] = [(Key::Key1, 1.0), (Key::Key2, 2.0), (Key::Key3, 4.0), (Key::Key4, 8.0)];

fn load_settings() -> Result<Settings, Error> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).map_err(|e| Error::Config(format!("{path}: {e}")))?;
            info!("settings from {path}");
            Settings::from_json(&text)
        }
        None => Ok(Settings::default()),
    }
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let settings = load_settings()?;
    let output = settings.eptz.output;

    /* --- Camera + ePTZ ---
       Visual: full field of view to start with. */
    let mut isp = SoftwareIsp::open(&settings.camera, output)?;
    let mut eptz = EptzController::new(isp.sensor_size(), &settings.eptz)?;
    eptz.apply(&mut isp)?;
    let mut tracker = Tracker::new(isp.sensor_size(), output, 2.0)?;

    let mut display = Display::new("FPV HUD", output, Transform::from(settings.eptz.rotation))?;

    /* --- HUD ---
       Visual: static pieces are drawn once and never touched again. */
    let mut hud = FpvOverlay::with_settings(output, &settings.overlay)?;
    hud.add_crosshair(24, CROSSHAIR_COLOR, 2).update_flight_mode(FLIGHT_MODES[0]);
    let corner = Rgba([255, 255, 255, 160]);
    hud.add_rectangle("frame", Rect::new(4, 4, output.width - 8, output.height - 8), corner, false, 1)?;
    let mut mode = 0;
    let mut hud_visible = true;
    info!("overlay {}x{} capability {:?}", output.width, output.height, hud.capability());

    let mut transition: Option<Transition> = None;
    let mut following = false;

    let started = Instant::now();
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;

    /* ------------------------------ Main loop ------------------------------ */
    while display.is_open() && !display.esc_pressed() {
        let now = Instant::now();
        let t = now.duration_since(started).as_secs_f64();

        /* 1) Inputs. Nudges cancel any running transition. */
        let mut nudged = true;
        if display.pressed_repeat(Key::Equal) || display.pressed_repeat(Key::NumPadPlus) {
            eptz.zoom_in();
        } else if display.pressed_repeat(Key::Minus) || display.pressed_repeat(Key::NumPadMinus) {
            eptz.zoom_out();
        } else if display.pressed_repeat(Key::Left) {
            eptz.pan_left();
        } else if display.pressed_repeat(Key::Right) {
            eptz.pan_right();
        } else if display.pressed_repeat(Key::Up) {
            eptz.tilt_up();
        } else if display.pressed_repeat(Key::Down) {
            eptz.tilt_down();
        } else if display.pressed_once(Key::Key0) {
            eptz.reset();
        } else {
            nudged = false;
        }
        if nudged {
            transition = None;
            following = false;
        }

        for (key, zoom) in ZOOM_PRESETS {
            if display.pressed_once(key) {
                let run = eptz.zoom_to(zoom, settings.eptz.transition_steps);
                info!(
                    "zoom to {zoom}x in {} steps, {:?} apart",
                    run.steps(),
                    run.interval(Duration::from_millis(settings.eptz.transition_ms))
                );
                transition = Some(run);
                following = false;
            }
        }

        if display.pressed_once(Key::F) {
            following = !following;
            transition = None;
            if !following {
                // Hand the tracker's view back to the controller.
                if let Err(e) = eptz.set_view(tracker.view()) {
                    warn!("tracker view rejected: {e}");
                    eptz.reset();
                }
                if hud.contains("target") {
                    hud.remove("target")?;
                }
            }
        }

        if display.pressed_once(Key::M) {
            mode = (mode + 1) % FLIGHT_MODES.len();
            hud.update_flight_mode(FLIGHT_MODES[mode]);
        }

        if display.pressed_once(Key::H) {
            hud_visible = !hud_visible;
            for name in ["crosshair_v", "crosshair_h", "frame"] {
                if hud_visible {
                    // show() does not repaint; put() with the same shape does.
                    if let Some(element) = hud.get(name) {
                        let (shape, color) = (element.shape().clone(), element.color());
                        hud.show(name)?.put(name, shape, color);
                    }
                } else {
                    hud.hide(name)?;
                }
            }
        }

        /* 2) Decide the crop for the next frame.
           Visual: the picture glides, jumps or follows. */
        if let Some(run) = transition.as_mut() {
            match run.next() {
                Some(view) => {
                    if let Err(e) = eptz.set_view(view) {
                        warn!("transition aborted: {e}");
                        transition = None;
                    }
                }
                None => transition = None,
            }
        }

        if following {
            let target = simulated_target(t, output.width as f64, output.height as f64);
            let crop = tracker.track(target)?;
            isp.apply_crop(crop);
            let shape = Shape::Rectangle {
                rect: Rect::new(
                    (target.center_x - target.width / 2.0) as i32,
                    (target.center_y - target.height / 2.0) as i32,
                    target.width as u32,
                    target.height as u32,
                ),
                filled: false,
                thickness: 2,
            };
            hud.put("target", shape, Rgba([0, 255, 255, 255]));
        } else {
            eptz.apply(&mut isp)?;
        }

        /* 3) Telemetry (simulated) and the zoom line. */
        let voltage = 12.6 - (t / 60.0).min(2.4);
        let rssi = (70.0 + 30.0 * (t * 0.7).sin()) as u8;
        hud.update_battery(voltage, 3).update_signal(rssi);
        let status = if following {
            let v = tracker.view();
            format!("TRACK {:.1}X {:.2} {:.2}", v.zoom, v.pan_x, v.pan_y)
        } else {
            format!("ZOOM {:.1}X {:.2} {:.2}", eptz.view().zoom, eptz.view().pan_x, eptz.view().pan_y)
        };
        hud.put(
            "status",
            Shape::Text { origin: (10, output.height as i32 - 24), text: status, scale: 2, shadow: true },
            WHITE,
        );
        hud.flush();

        /* 4) Grab, composite, present. */
        let frame = isp.next_frame()?;
        display.show_frame(&frame)?;
        display.present_overlay(hud.view())?;

        /* 5) FPS + stats once per second. */
        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let stats = hud.stats();
            info!(
                "FPS: {:.1} | {} | elements {} updates {} | {:.2} MB",
                frames_this_second as f32 / secs,
                eptz.status(),
                stats.element_count,
                stats.update_count,
                stats.memory_mb()
            );
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    Ok(())
}

/// A target drifting on a Lissajous path, in output pixels.
fn simulated_target(t: f64, width: f64, height: f64) -> Target {
    Target {
        center_x: width * (0.5 + 0.3 * (t * 0.4).sin()),
        center_y: height * (0.5 + 0.25 * (t * 0.3).cos()),
        width: width * 0.15,
        height: height * 0.2,
    }
}
