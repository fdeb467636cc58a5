/// Build script for Daybreak
///
/// # Shader Compilation Strategy:
/// - DX12: HLSL compute shaders are embedded with `include_str!` and compiled at runtime via D3DCompile
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=src/gfx/dx12/shaders/generate_mips.hlsl");
}
