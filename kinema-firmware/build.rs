//! Build script for kinema-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates servos.toml and generates the calibration table

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Servo channels on the board
const SERVO_COUNT: usize = 6;

/// Factory calibration used for channels without an entry
const DEFAULT_SERVO: ServoEntry = ServoEntry {
    name: String::new(),
    min_pulse: 500,
    mid_pulse: None,
    max_pulse: 2500,
    min_angle: 0.0,
    mid_angle: None,
    max_angle: 270.0,
};

struct ServoEntry {
    name: String,
    min_pulse: i64,
    mid_pulse: Option<i64>,
    max_pulse: i64,
    min_angle: f64,
    mid_angle: Option<f64>,
    max_angle: f64,
}

fn main() {
    setup_linker();
    let servos = load_servos();
    generate_calibration(&servos);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Read and validate servos.toml
fn load_servos() -> Vec<ServoEntry> {
    println!("cargo:rerun-if-changed=servos.toml");

    let config_path = Path::new("servos.toml");
    if !config_path.exists() {
        println!("cargo:warning=servos.toml not found, using default calibration");
        return Vec::new();
    }

    let content = fs::read_to_string(config_path)
        .unwrap_or_else(|e| fail("Failed to read servos.toml", &[e.to_string()]));

    let config: toml::Value = toml::from_str(&content).unwrap_or_else(|e| {
        let lines: Vec<String> = e.to_string().lines().map(str::to_string).collect();
        fail("Invalid TOML syntax in servos.toml", &lines)
    });

    let entries = match config.get("servo") {
        None => return Vec::new(),
        Some(toml::Value::Array(entries)) => entries,
        Some(_) => fail("Invalid servos.toml", &["'servo' must be an array of tables".into()]),
    };

    let mut errors = Vec::new();
    if entries.len() > SERVO_COUNT {
        errors.push(format!("at most {} [[servo]] entries are allowed", SERVO_COUNT));
    }

    let mut servos = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(table) = entry.as_table() else {
            errors.push(format!("servo {} must be a table", index));
            continue;
        };
        match parse_servo(index, table) {
            Ok(servo) => servos.push(servo),
            Err(mut e) => errors.append(&mut e),
        }
    }

    if !errors.is_empty() {
        fail("Invalid servo calibration", &errors);
    }

    println!("cargo:warning=servos.toml validated successfully");
    servos
}

fn parse_servo(index: usize, table: &toml::Table) -> Result<ServoEntry, Vec<String>> {
    let mut errors = Vec::new();

    let int = |key: &str, errors: &mut Vec<String>| match table.get(key) {
        Some(toml::Value::Integer(v)) if (0..=u16::MAX as i64).contains(v) => Some(*v),
        Some(_) => {
            errors.push(format!("servo {}: '{}' must be an integer 0-65535", index, key));
            None
        }
        None => None,
    };
    let float = |key: &str, errors: &mut Vec<String>| match table.get(key) {
        Some(toml::Value::Float(v)) if v.is_finite() => Some(*v),
        Some(toml::Value::Integer(v)) => Some(*v as f64),
        Some(_) => {
            errors.push(format!("servo {}: '{}' must be a number", index, key));
            None
        }
        None => None,
    };

    let name = match table.get("name") {
        Some(toml::Value::String(s)) => s.clone(),
        Some(_) => {
            errors.push(format!("servo {}: 'name' must be a string", index));
            String::new()
        }
        None => format!("servo{}", index),
    };

    let min_pulse = int("min_pulse", &mut errors).unwrap_or(DEFAULT_SERVO.min_pulse);
    let mid_pulse = int("mid_pulse", &mut errors);
    let max_pulse = int("max_pulse", &mut errors).unwrap_or(DEFAULT_SERVO.max_pulse);
    let min_angle = float("min_angle", &mut errors).unwrap_or(DEFAULT_SERVO.min_angle);
    let mid_angle = float("mid_angle", &mut errors);
    let max_angle = float("max_angle", &mut errors).unwrap_or(DEFAULT_SERVO.max_angle);

    if min_pulse >= max_pulse {
        errors.push(format!("servo {} ({}): min_pulse must be below max_pulse", index, name));
    }
    if let Some(mid) = mid_pulse {
        if mid < min_pulse || mid > max_pulse {
            errors.push(format!("servo {} ({}): mid_pulse outside pulse range", index, name));
        }
    }
    if min_angle >= max_angle {
        errors.push(format!("servo {} ({}): min_angle must be below max_angle", index, name));
    }
    if let Some(mid) = mid_angle {
        if mid < min_angle || mid > max_angle {
            errors.push(format!("servo {} ({}): mid_angle outside angle range", index, name));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ServoEntry {
        name,
        min_pulse,
        mid_pulse,
        max_pulse,
        min_angle,
        mid_angle,
        max_angle,
    })
}

/// Write `servos.rs` into OUT_DIR
fn generate_calibration(servos: &[ServoEntry]) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let fallback = DEFAULT_SERVO;
    let mut names = String::new();
    let mut profiles = String::new();
    for index in 0..SERVO_COUNT {
        let servo = servos.get(index).unwrap_or(&fallback);
        let name = if servo.name.is_empty() {
            format!("servo{}", index)
        } else {
            servo.name.clone()
        };
        let mid_pulse = servo
            .mid_pulse
            .unwrap_or(servo.min_pulse + (servo.max_pulse - servo.min_pulse) / 2);
        let mid_angle = servo
            .mid_angle
            .unwrap_or((servo.min_angle + servo.max_angle) / 2.0);

        names.push_str(&format!("    {:?},\n", name));
        profiles.push_str(&format!(
            "    ServoProfile {{\n        \
                min_pulse: {},\n        \
                mid_pulse: {},\n        \
                max_pulse: {},\n        \
                min_angle: {:?}_f32,\n        \
                mid_angle: {:?}_f32,\n        \
                max_angle: {:?}_f32,\n    \
            }},\n",
            servo.min_pulse,
            mid_pulse,
            servo.max_pulse,
            servo.min_angle as f32,
            mid_angle as f32,
            servo.max_angle as f32,
        ));
    }

    let code = format!(
        "// Generated from servos.toml\n\n\
        /// Servo names, indexed by channel\n\
        pub const SERVO_NAMES: [&str; {count}] = [\n{names}];\n\n\
        /// Build-time calibration, indexed by channel\n\
        pub const SERVO_PROFILES: [ServoProfile; {count}] = [\n{profiles}];\n",
        count = SERVO_COUNT,
    );

    let mut f = File::create(out_dir.join("servos.rs")).unwrap();
    f.write_all(code.as_bytes()).unwrap();
}

/// Abort the build with a boxed error report
fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        lines
            .iter()
            .map(|line| {
                let truncated = if line.len() > 62 {
                    format!("{}...", &line[..59])
                } else {
                    line.clone()
                };
                format!("║  • {:<62} ║", truncated)
            })
            .collect::<Vec<_>>()
            .join("\n")
    );
}
