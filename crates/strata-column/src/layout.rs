//! Encoded vector layout.
//!
//! Every materialized vector piece is laid out as a validity bitmap
//! (one bit per row, set = valid) followed by a type-specific payload:
//!
//! - fixed-width types: `rows * width` little-endian bytes
//! - varchar: `rows * u32` length array, then the concatenated UTF-8 bytes
//! - list: `rows * (u64 offset, u64 length)` entries into the flattened
//!   child vector
//! - struct: no payload; the children are separate vectors
//!
//! NULL rows occupy zeroed payload slots so that offsets stay computable
//! without consulting the bitmap.

use strata_common::types::{LogicalType, Value};

use crate::error::{ColumnError, ColumnResult};

/// Bytes needed for the validity bitmap of `rows` rows.
pub(crate) fn validity_bytes(rows: usize) -> usize {
    rows.div_ceil(8)
}

/// Writes the validity bitmap for `values` into the start of `dst`.
pub(crate) fn write_validity(dst: &mut [u8], values: &[Value]) {
    for (row, value) in values.iter().enumerate() {
        if !value.is_null() {
            dst[row / 8] |= 1 << (row % 8);
        }
    }
}

/// Reads one bit of a validity bitmap.
pub(crate) fn bit_is_set(validity: &[u8], row: usize) -> bool {
    validity[row / 8] & (1 << (row % 8)) != 0
}

fn width_of(ty: &LogicalType) -> ColumnResult<usize> {
    ty.fixed_width()
        .ok_or_else(|| ColumnError::internal(format!("type {ty} has no fixed width")))
}

// =============================================================================
// Fixed-width payloads
// =============================================================================

/// Encoded size of a fixed-width piece of `rows` rows.
pub(crate) fn fixed_piece_size(ty: &LogicalType, rows: usize) -> ColumnResult<usize> {
    Ok(validity_bytes(rows) + rows * width_of(ty)?)
}

/// Encodes fixed-width values into `dst` (exactly `fixed_piece_size` bytes).
pub(crate) fn encode_fixed_piece(
    dst: &mut [u8],
    ty: &LogicalType,
    values: &[Value],
) -> ColumnResult<()> {
    let width = width_of(ty)?;
    write_validity(dst, values);
    let payload = &mut dst[validity_bytes(values.len())..];
    for (row, value) in values.iter().enumerate() {
        let slot = &mut payload[row * width..(row + 1) * width];
        encode_scalar(slot, ty, value)?;
    }
    Ok(())
}

fn encode_scalar(slot: &mut [u8], ty: &LogicalType, value: &Value) -> ColumnResult<()> {
    match (ty, value) {
        (_, Value::Null) => slot.fill(0),
        (LogicalType::Boolean, Value::Boolean(v)) => slot[0] = u8::from(*v),
        (LogicalType::Int8, Value::Int8(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (LogicalType::Int16, Value::Int16(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (LogicalType::Int32, Value::Int32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (LogicalType::Int64, Value::Int64(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (LogicalType::Float32, Value::Float32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (LogicalType::Float64, Value::Float64(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (LogicalType::Decimal { .. }, Value::Decimal(v)) => {
            slot.copy_from_slice(&v.to_le_bytes())
        }
        (LogicalType::Timestamp, Value::Timestamp(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (LogicalType::Date, Value::Date(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        _ => {
            return Err(ColumnError::TypeMismatch {
                expected: ty.clone(),
                value: value.to_string(),
            })
        }
    }
    Ok(())
}

/// Decodes a fixed-width piece of `rows` rows.
pub(crate) fn decode_fixed_piece(
    src: &[u8],
    ty: &LogicalType,
    rows: usize,
) -> ColumnResult<Vec<Value>> {
    let width = width_of(ty)?;
    let validity = &src[..validity_bytes(rows)];
    let payload = &src[validity_bytes(rows)..];
    let mut values = Vec::with_capacity(rows);
    for row in 0..rows {
        if !bit_is_set(validity, row) {
            values.push(Value::Null);
            continue;
        }
        let slot = &payload[row * width..(row + 1) * width];
        values.push(decode_scalar(slot, ty));
    }
    Ok(values)
}

fn decode_scalar(slot: &[u8], ty: &LogicalType) -> Value {
    let mut b8 = [0u8; 8];
    let mut b4 = [0u8; 4];
    let mut b2 = [0u8; 2];
    let mut b16 = [0u8; 16];
    match ty {
        LogicalType::Boolean => Value::Boolean(slot[0] != 0),
        LogicalType::Int8 => Value::Int8(slot[0] as i8),
        LogicalType::Int16 => {
            b2.copy_from_slice(slot);
            Value::Int16(i16::from_le_bytes(b2))
        }
        LogicalType::Int32 => {
            b4.copy_from_slice(slot);
            Value::Int32(i32::from_le_bytes(b4))
        }
        LogicalType::Int64 => {
            b8.copy_from_slice(slot);
            Value::Int64(i64::from_le_bytes(b8))
        }
        LogicalType::Float32 => {
            b4.copy_from_slice(slot);
            Value::Float32(f32::from_le_bytes(b4))
        }
        LogicalType::Float64 => {
            b8.copy_from_slice(slot);
            Value::Float64(f64::from_le_bytes(b8))
        }
        LogicalType::Decimal { .. } => {
            b16.copy_from_slice(slot);
            Value::Decimal(i128::from_le_bytes(b16))
        }
        LogicalType::Timestamp => {
            b8.copy_from_slice(slot);
            Value::Timestamp(i64::from_le_bytes(b8))
        }
        LogicalType::Date => {
            b4.copy_from_slice(slot);
            Value::Date(i32::from_le_bytes(b4))
        }
        // Non-scalar types never reach this path.
        _ => Value::Null,
    }
}

// =============================================================================
// Varchar payloads
// =============================================================================

fn varchar_len(value: &Value) -> usize {
    match value {
        Value::Varchar(s) => s.len(),
        _ => 0,
    }
}

/// Encoded size of a varchar piece holding `values`.
pub(crate) fn varchar_piece_size(values: &[Value]) -> usize {
    validity_bytes(values.len())
        + values.len() * 4
        + values.iter().map(varchar_len).sum::<usize>()
}

/// Encodes a varchar piece into `dst` (exactly `varchar_piece_size` bytes).
pub(crate) fn encode_varchar_piece(dst: &mut [u8], values: &[Value]) -> ColumnResult<()> {
    write_validity(dst, values);
    let rows = values.len();
    let (lengths, bytes) = dst[validity_bytes(rows)..].split_at_mut(rows * 4);
    let mut cursor = 0usize;
    for (row, value) in values.iter().enumerate() {
        let s = match value {
            Value::Varchar(s) => s.as_str(),
            Value::Null => "",
            other => {
                return Err(ColumnError::TypeMismatch {
                    expected: LogicalType::Varchar,
                    value: other.to_string(),
                })
            }
        };
        lengths[row * 4..(row + 1) * 4].copy_from_slice(&(s.len() as u32).to_le_bytes());
        bytes[cursor..cursor + s.len()].copy_from_slice(s.as_bytes());
        cursor += s.len();
    }
    Ok(())
}

/// Decodes a varchar piece of `rows` rows.
pub(crate) fn decode_varchar_piece(src: &[u8], rows: usize) -> ColumnResult<Vec<Value>> {
    let validity = &src[..validity_bytes(rows)];
    let lengths = &src[validity_bytes(rows)..validity_bytes(rows) + rows * 4];
    let bytes = &src[validity_bytes(rows) + rows * 4..];
    let mut values = Vec::with_capacity(rows);
    let mut cursor = 0usize;
    for row in 0..rows {
        let mut b4 = [0u8; 4];
        b4.copy_from_slice(&lengths[row * 4..(row + 1) * 4]);
        let len = u32::from_le_bytes(b4) as usize;
        if bit_is_set(validity, row) {
            let s = String::from_utf8(bytes[cursor..cursor + len].to_vec())
                .map_err(|e| ColumnError::internal(format!("corrupt varchar payload: {e}")))?;
            values.push(Value::Varchar(s));
        } else {
            values.push(Value::Null);
        }
        cursor += len;
    }
    Ok(values)
}

// =============================================================================
// List entry payloads
// =============================================================================

/// Encoded size of a list entry piece of `rows` rows.
pub(crate) fn list_piece_size(rows: usize) -> usize {
    validity_bytes(rows) + rows * 16
}

/// Encodes list entries; offsets index into the chunk's flattened child
/// vector. Returns the total number of child elements.
pub(crate) fn encode_list_entries(dst: &mut [u8], values: &[Value]) -> ColumnResult<usize> {
    write_validity(dst, values);
    let payload = &mut dst[validity_bytes(values.len())..];
    let mut offset = 0u64;
    for (row, value) in values.iter().enumerate() {
        let len = match value {
            Value::List(items) => items.len() as u64,
            Value::Null => 0,
            other => {
                return Err(ColumnError::internal(format!(
                    "list column holds non-list value {other}"
                )))
            }
        };
        let slot = &mut payload[row * 16..(row + 1) * 16];
        slot[..8].copy_from_slice(&offset.to_le_bytes());
        slot[8..].copy_from_slice(&len.to_le_bytes());
        offset += len;
    }
    Ok(offset as usize)
}

/// Decodes list entries into `(offset, length)` pairs; NULL rows are `None`.
pub(crate) fn decode_list_entries(
    src: &[u8],
    rows: usize,
) -> Vec<Option<(usize, usize)>> {
    let validity = &src[..validity_bytes(rows)];
    let payload = &src[validity_bytes(rows)..];
    let mut entries = Vec::with_capacity(rows);
    for row in 0..rows {
        if !bit_is_set(validity, row) {
            entries.push(None);
            continue;
        }
        let slot = &payload[row * 16..(row + 1) * 16];
        let mut b8 = [0u8; 8];
        b8.copy_from_slice(&slot[..8]);
        let offset = u64::from_le_bytes(b8) as usize;
        b8.copy_from_slice(&slot[8..]);
        let len = u64::from_le_bytes(b8) as usize;
        entries.push(Some((offset, len)));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_round_trip() {
        let values = vec![
            Value::Int32(1),
            Value::Null,
            Value::Int32(3),
            Value::Null,
            Value::Null,
            Value::Int32(6),
            Value::Int32(7),
            Value::Int32(8),
            Value::Int32(9),
        ];
        let mut dst = vec![0u8; validity_bytes(values.len())];
        write_validity(&mut dst, &values);
        for (row, value) in values.iter().enumerate() {
            assert_eq!(bit_is_set(&dst, row), !value.is_null());
        }
    }

    #[test]
    fn test_fixed_round_trip() {
        let ty = LogicalType::Int64;
        let values = vec![Value::Int64(-1), Value::Null, Value::Int64(i64::MAX)];
        let size = fixed_piece_size(&ty, values.len()).unwrap();
        let mut dst = vec![0u8; size];
        encode_fixed_piece(&mut dst, &ty, &values).unwrap();
        assert_eq!(decode_fixed_piece(&dst, &ty, values.len()).unwrap(), values);
    }

    #[test]
    fn test_decimal_round_trip() {
        let ty = LogicalType::Decimal { width: 38, scale: 10 };
        let values = vec![Value::Decimal(-(1i128 << 90)), Value::Decimal(42)];
        let size = fixed_piece_size(&ty, values.len()).unwrap();
        let mut dst = vec![0u8; size];
        encode_fixed_piece(&mut dst, &ty, &values).unwrap();
        assert_eq!(decode_fixed_piece(&dst, &ty, values.len()).unwrap(), values);
    }

    #[test]
    fn test_varchar_round_trip() {
        let values = vec![
            Value::varchar("alpha"),
            Value::Null,
            Value::varchar(""),
            Value::varchar("こんにちは"),
        ];
        let mut dst = vec![0u8; varchar_piece_size(&values)];
        encode_varchar_piece(&mut dst, &values).unwrap();
        assert_eq!(decode_varchar_piece(&dst, values.len()).unwrap(), values);
    }

    #[test]
    fn test_list_entries_round_trip() {
        let values = vec![
            Value::List(vec![Value::Int32(1), Value::Int32(2)]),
            Value::Null,
            Value::List(vec![]),
            Value::List(vec![Value::Int32(3)]),
        ];
        let mut dst = vec![0u8; list_piece_size(values.len())];
        let total = encode_list_entries(&mut dst, &values).unwrap();
        assert_eq!(total, 3);

        let entries = decode_list_entries(&dst, values.len());
        assert_eq!(
            entries,
            vec![Some((0, 2)), None, Some((2, 0)), Some((2, 1))]
        );
    }
}
