//! Byte layouts of every page the gateway sends or receives.
//!
//! All pages are [`PAYLOAD_LEN`] bytes.  Byte 0 is always the page tag and
//! multi-byte integers are little endian.  Byte 1 of outbound pages carries
//! the sender's wrapping message id, which the monitoring application echoes
//! back in its acknowledgment.
//!
//! | Page | Layout |
//! |---|---|
//! | 0x11 position | node `u16`, type, rotation, x/y nibbles, offset x, offset y |
//! | 0x20 ack | message id, acknowledged page tag |
//! | 0x21 ranging | id, node `u16`, rotation, distance `u16`, zone |
//! | 0x22 motion | id, node `u16`, rotation, detected |
//! | 0x23 activity | id, `row << 4 \| col`, value `f32`, class |
//! | 0x24 indicator | id, node `u16`, function, colour, padding |
//! | 0x25 / 0x26 sensor error | id, node `u16`, kind, rotation, flag, padding |

use roadwatch_types::{
    AckEvent, Classification, CoreError, GridOffset, GridPosition, IndicatorCommand, NodeId, NodeType, Octant,
    PAYLOAD_LEN, PageTag, Payload, PositionConfig, SensorKey,
};

/// Length of the LED command frame sent over the mesh.
pub const MESH_FRAME_LEN: usize = 5;

const MESH_LED_COMMAND: u8 = 0x03;
const PAD: u8 = 0xFF;

fn header(tag: PageTag, message_id: u8) -> Payload {
    let mut p = [0u8; PAYLOAD_LEN];
    p[0] = tag.0;
    p[1] = message_id;
    p
}

fn put_node(p: &mut Payload, at: usize, node_id: NodeId) {
    p[at..at + 2].copy_from_slice(&node_id.to_le_bytes());
}

fn expect_tag(payload: &Payload, tag: PageTag) -> Result<(), CoreError> {
    if payload[0] == tag.0 {
        Ok(())
    } else {
        Err(CoreError::MalformedPage { page: tag, details: format!("unexpected tag 0x{:02X}", payload[0]) })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inbound
// ────────────────────────────────────────────────────────────────────────────

/// Sign-extend the low four bits of `nibble`.
fn signed_nibble(nibble: u8) -> i8 {
    ((nibble << 4) as i8) >> 4
}

/// Decode a position configuration page (0x11).
///
/// # Errors
///
/// [`CoreError::MalformedPage`] if byte 0 is not the position tag.
pub fn decode_position_page(payload: &Payload) -> Result<PositionConfig, CoreError> {
    expect_tag(payload, PageTag::POSITION_CONFIG)?;
    Ok(PositionConfig {
        node_id: u16::from_le_bytes([payload[1], payload[2]]),
        node_type: NodeType::from_bits(payload[3]),
        rotation: Octant::from_bits(payload[4]),
        position: GridPosition::new(signed_nibble(payload[5]), signed_nibble(payload[5] >> 4)),
        offset: GridOffset { x: payload[6] as i8, y: payload[7] as i8 },
    })
}

/// Encode a position configuration page, the inverse of
/// [`decode_position_page`] for coordinates in `-8..8`.
pub fn encode_position_page(config: &PositionConfig) -> Payload {
    let mut p = [0u8; PAYLOAD_LEN];
    p[0] = PageTag::POSITION_CONFIG.0;
    put_node(&mut p, 1, config.node_id);
    p[3] = config.node_type.bits();
    p[4] = config.rotation.raw();
    p[5] = (config.position.x as u8 & 0x0F) | ((config.position.y as u8 & 0x0F) << 4);
    p[6] = config.offset.x as u8;
    p[7] = config.offset.y as u8;
    p
}

/// Decode an acknowledgment page (0x20).
///
/// # Errors
///
/// [`CoreError::MalformedPage`] if byte 0 is not the acknowledgment tag.
pub fn decode_ack(payload: &Payload) -> Result<AckEvent, CoreError> {
    expect_tag(payload, PageTag::ACKNOWLEDGEMENT)?;
    Ok(AckEvent { message_id: payload[1], page: PageTag(payload[2]) })
}

pub fn encode_ack(ack: &AckEvent) -> Payload {
    let mut p = header(PageTag::ACKNOWLEDGEMENT, ack.message_id);
    p[2] = ack.page.0;
    p
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound
// ────────────────────────────────────────────────────────────────────────────

pub fn encode_ranging_sample(message_id: u8, node_id: NodeId, rotation: Octant, distance_cm: u16, zone: u8) -> Payload {
    let mut p = header(PageTag::RANGING_SAMPLE, message_id);
    put_node(&mut p, 2, node_id);
    p[4] = rotation.raw();
    p[5..7].copy_from_slice(&distance_cm.to_le_bytes());
    p[7] = zone;
    p
}

pub fn encode_motion_sample(message_id: u8, node_id: NodeId, rotation: Octant, detected: bool) -> Payload {
    let mut p = header(PageTag::MOTION_SAMPLE, message_id);
    put_node(&mut p, 2, node_id);
    p[4] = rotation.raw();
    p[5] = u8::from(detected);
    p
}

/// Activity variable echo.  Cell coordinates must fit in a nibble each.
pub fn encode_activity_variable(message_id: u8, col: usize, row: usize, value: f32, class: Classification) -> Payload {
    let mut p = header(PageTag::ACTIVITY_VARIABLE, message_id);
    p[2] = activity_key(col, row);
    p[3..7].copy_from_slice(&value.to_le_bytes());
    p[7] = class.wire_code();
    p
}

/// Packed cell address used as byte 2 of the activity page.
pub fn activity_key(col: usize, row: usize) -> u8 {
    (((row & 0x0F) << 4) | (col & 0x0F)) as u8
}

pub fn encode_indicator_status(message_id: u8, command: &IndicatorCommand) -> Payload {
    let mut p = header(PageTag::INDICATOR_STATUS, message_id);
    put_node(&mut p, 2, command.node_id);
    p[4] = command.function.wire_code();
    p[5] = command.colour.wire_code();
    p[6] = PAD;
    p[7] = PAD;
    p
}

/// Hyperactive (0x25) or inactive (0x26) sensor report.  `flag` is 1 while
/// the condition holds and 0 once it cleared.
pub fn encode_sensor_error(tag: PageTag, message_id: u8, key: &SensorKey, flag: bool) -> Payload {
    let mut p = header(tag, message_id);
    put_node(&mut p, 2, key.node_id);
    p[4] = key.kind.wire_code();
    p[5] = key.rotation.raw();
    p[6] = u8::from(flag);
    p[7] = PAD;
    p
}

/// LED command frame addressed to one indicator node over the mesh.
pub fn mesh_indicator_frame(command: &IndicatorCommand) -> [u8; MESH_FRAME_LEN] {
    [MESH_LED_COMMAND, command.function.wire_code(), command.colour.wire_code(), PAD, PAD]
}
