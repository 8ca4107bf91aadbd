use std::{path::Path, process::Command};

const SHADER_DIR: &str = "shaders";
const SHADER_STAGES: [&str; 2] = ["vert", "frag"];

// Compiles every GLSL shader in `shaders/` next to its source as `<name>.<stage>.spv`,
// the paths the app loads by default. Needs `glslc` from the Vulkan SDK on the PATH.
fn main() {
    let entries = match std::fs::read_dir(SHADER_DIR) {
        Ok(entries) => entries,
        Err(err) => {
            println!("cargo:warning=Can't read {}: {}", SHADER_DIR, err);
            return;
        }
    };

    for entry in entries.flatten() {
        let source = entry.path();
        let is_shader = source
            .extension()
            .and_then(|extension| extension.to_str())
            .map_or(false, |extension| SHADER_STAGES.contains(&extension));
        if is_shader {
            compile(&source);
        }
    }
}

fn compile(source: &Path) {
    println!("cargo:rerun-if-changed={}", source.display());
    let output = source.with_extension(match source.extension() {
        Some(extension) => format!("{}.spv", extension.to_string_lossy()),
        None => return,
    });

    match Command::new("glslc").arg(source).arg("-o").arg(&output).status() {
        Ok(status) if status.success() => {}
        Ok(status) => println!(
            "cargo:warning=glslc failed on {} ({})",
            source.display(),
            status
        ),
        Err(err) => println!(
            "cargo:warning=Can't run glslc to compile {}, install the Vulkan SDK or pass \
             precompiled SPIR-V paths to the demo ({})",
            source.display(),
            err
        ),
    }
}
