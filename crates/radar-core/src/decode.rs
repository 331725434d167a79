use crate::frame::{MetricsFrame, Status, CHANNEL_COUNT};
use chrono::Utc;

const POSITION_MARKER: &str = "P3DX1";
const VELOCITY_MARKER: &str = "V3DX1";

/// Decodes one radar reply into a metrics frame.
///
/// Never panics on malformed input: a missing block, a short token list, or
/// an unparsable token leaves the corresponding channels at zero and is
/// logged as a warning by the caller via the returned `warnings`. The
/// frame's timestamp is "now on receipt"; its status is always `Ok` — the
/// decoder never signals anything other than a partial parse, matching
/// §4.1 ("decode... returns a metrics frame whose... status is ok unless
/// the decoder signals a partial parse").
pub struct DecodeOutcome {
    pub frame: MetricsFrame,
    pub warnings: Vec<String>,
}

/// Runs the full decode algorithm from §4.1: normalize to a token stream,
/// locate the `P3DX1` and `V3DX1` blocks, and interpret their scale/count/
/// raw-value triples.
#[must_use]
pub fn decode(reply: &[u8]) -> DecodeOutcome {
    let normalized: String = reply
        .iter()
        .map(|&b| {
            if (0x20..=0x7E).contains(&b) {
                b as char
            } else {
                ' '
            }
        })
        .collect();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let mut warnings = Vec::new();
    let mut positions = [0.0_f64; CHANNEL_COUNT];
    let mut velocities = [0.0_f64; CHANNEL_COUNT];

    match parse_block(&tokens, POSITION_MARKER) {
        Some(block) => fill_positions(&tokens, &block, &mut positions),
        None => warnings.push(format!("{POSITION_MARKER} block not found or truncated")),
    }

    match parse_block(&tokens, VELOCITY_MARKER) {
        Some(block) => fill_velocities(&tokens, &block, &mut velocities),
        None => warnings.push(format!("{VELOCITY_MARKER} block not found or truncated")),
    }

    DecodeOutcome {
        frame: MetricsFrame {
            timestamp: Utc::now(),
            positions,
            velocities,
            status: Status::Ok,
        },
        warnings,
    }
}

struct Block {
    scale: f64,
    count: usize,
    first_raw_index: usize,
}

/// Locates `marker` in the token stream and reads its scale (8-hex-digit
/// IEEE-754 single-precision bit pattern at `marker + 1`) and declared
/// count (decimal at `marker + 3`, clamped to `CHANNEL_COUNT`). Returns
/// `None` if the marker is absent or too few tokens follow it.
fn parse_block(tokens: &[&str], marker: &str) -> Option<Block> {
    let marker_idx = tokens.iter().position(|t| *t == marker)?;
    let scale_token = tokens.get(marker_idx + 1)?;
    let count_token = tokens.get(marker_idx + 3)?;

    let scale_bits = u32::from_str_radix(scale_token, 16).ok()?;
    let scale = f64::from(f32::from_bits(scale_bits));
    let count = count_token.parse::<usize>().ok()?.min(CHANNEL_COUNT);

    Some(Block {
        scale,
        count,
        first_raw_index: marker_idx + 4,
    })
}

fn fill_positions(tokens: &[&str], block: &Block, out: &mut [f64; CHANNEL_COUNT]) {
    for i in 0..block.count {
        let Some(raw_token) = tokens.get(block.first_raw_index + i) else {
            break;
        };
        let Ok(raw) = u32::from_str_radix(raw_token, 16) else {
            continue;
        };
        out[i] = f64::from(raw) * block.scale / 1000.0;
    }
}

fn fill_velocities(tokens: &[&str], block: &Block, out: &mut [f64; CHANNEL_COUNT]) {
    for i in 0..block.count {
        let Some(raw_token) = tokens.get(block.first_raw_index + i) else {
            break;
        };
        let Ok(raw) = u32::from_str_radix(raw_token, 16) else {
            continue;
        };
        let signed = if raw > 32767 { raw as i64 - 65536 } else { raw as i64 };
        out[i] = signed as f64 * block.scale;
    }
}
