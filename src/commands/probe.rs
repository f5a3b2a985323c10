use std::fmt::Write as _;

use logotrace::{
    DecodedImage, EncodedImage, Normalizer, Palette, TracingConfig, VectorizeResult, accept_path,
};

use crate::cli::{GlobalOptions, ProbeCommand};

use super::utils::input_limits;

/// The main function to run the probe command.
pub fn run(global: &GlobalOptions, cmd: ProbeCommand) -> VectorizeResult<()> {
    let limits = input_limits(global);
    let encoded = accept_path(&cmd.input, &limits)?;
    let normalizer = Normalizer::new(limits);
    let decoded = normalizer.decode(&encoded)?;
    let header = describe(&encoded, &decoded);
    let buffer = normalizer.rasterize(decoded)?;

    let defaults = TracingConfig::default();
    let palette = Palette::build(
        &buffer.into_rgba_image(),
        cmd.colors,
        defaults.quantization_passes,
        defaults.min_color_ratio,
    );
    print!("{header}{}", describe_palette(&palette));
    Ok(())
}

fn describe(encoded: &EncodedImage, decoded: &DecodedImage) -> String {
    let (width, height) = decoded.dimensions();
    format!(
        "format:     {} ({})\nsize:       {} bytes\ndimensions: {width}x{height}\n",
        decoded.format(),
        decoded.format().mime_type(),
        encoded.len(),
    )
}

fn describe_palette(palette: &Palette) -> String {
    let mut out = format!("palette:    {} colors\n", palette.len());
    for (index, entry) in palette.entries().iter().enumerate() {
        let [r, g, b, a] = entry.color;
        let coverage = palette.coverage(index).unwrap_or_default() * 100.0;
        let _ = writeln!(
            out,
            "  #{r:02x}{g:02x}{b:02x} alpha {a:>3}  {coverage:>6.2}%  ({} px)",
            entry.count
        );
    }
    out
}
