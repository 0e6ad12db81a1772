//! Readers: decode whatever rule a signal uses into plain sample buffers.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::property::PropertyValue;
use crate::signal::connection::Connection;
use crate::signal::descriptor::{DataDescriptor, Rule, SampleType};
use crate::signal::packet::{DataPacket, Packet};

/// Decoded output of [`Reader::read`]: explicit sample bytes regardless
/// of the underlying rule.
pub struct ReadResult {
    pub descriptor: Arc<DataDescriptor>,
    pub samples: Vec<u8>,
    pub sample_count: usize,
}

/// Pulls packets off a [`Connection`] and expands `Linear`/`Constant`
/// rules into explicit sample buffers, so callers never need to know
/// which rule a signal used.
pub struct Reader {
    connection: Arc<Connection>,
    last_constant: Option<PropertyValue>,
    joined_mid_stream: bool,
}

impl Reader {
    #[must_use]
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            last_constant: None,
            joined_mid_stream: true,
        }
    }

    /// Pop and decode the next data packet, if any is queued.
    pub fn read(&mut self) -> Result<Option<ReadResult>> {
        let Some(packet) = self.connection.dequeue() else {
            return Ok(None);
        };
        match packet {
            Packet::Data(data) => Ok(Some(self.decode(data)?)),
            Packet::Event(_) => self.read(),
        }
    }

    /// Pop and return the next event packet, skipping data packets.
    pub fn read_event(&mut self) -> Option<crate::signal::packet::EventPacket> {
        loop {
            match self.connection.dequeue()? {
                Packet::Event(event) => return Some(event),
                Packet::Data(_) => continue,
            }
        }
    }

    fn decode(&mut self, packet: DataPacket) -> Result<ReadResult> {
        match &packet.descriptor.rule {
            Rule::Explicit => Ok(ReadResult {
                descriptor: packet.descriptor.clone(),
                samples: packet.buffer.to_vec(),
                sample_count: packet.sample_count,
            }),
            Rule::Linear { delta, start } => {
                let size = packet.descriptor.sample_type.size_bytes().ok_or_else(|| Error::InvalidValue {
                    property: "sample_type".to_string(),
                    reason: "linear rule requires a fixed-size sample type".to_string(),
                })?;
                let mut samples = Vec::with_capacity(size * packet.sample_count);
                for n in 0..packet.sample_count {
                    let value = start + delta * (packet.offset + n) as i64;
                    samples.extend_from_slice(&value.to_le_bytes()[..size.min(8)]);
                }
                Ok(ReadResult {
                    descriptor: packet.descriptor.clone(),
                    samples,
                    sample_count: packet.sample_count,
                })
            }
            Rule::Constant { value } => {
                // A reader joining mid-stream has no samples to emit
                // until the next constant-value change arrives.
                if self.joined_mid_stream && self.last_constant.is_none() {
                    self.joined_mid_stream = false;
                    self.last_constant = Some(value.clone());
                    return Ok(ReadResult {
                        descriptor: packet.descriptor.clone(),
                        samples: Vec::new(),
                        sample_count: 0,
                    });
                }
                let sample_type = packet.descriptor.sample_type;
                let size = sample_type.size_bytes().unwrap_or(0);
                let mut current = value.clone();
                let mut changes = packet.value_changes.iter().peekable();
                let mut samples = Vec::with_capacity(size * packet.sample_count);
                for n in 0..packet.sample_count {
                    while matches!(changes.peek(), Some((index, _)) if *index <= n) {
                        let (_, new_value) = changes.next().expect("peek confirmed Some");
                        current = new_value.clone();
                    }
                    if size > 0 {
                        samples.extend_from_slice(&encode_constant_sample(&current, sample_type)?);
                    }
                }
                self.last_constant = Some(current);
                Ok(ReadResult {
                    descriptor: packet.descriptor.clone(),
                    samples,
                    sample_count: packet.sample_count,
                })
            }
        }
    }
}

/// Render one constant-rule sample as little-endian bytes matching
/// `sample_type`, rather than silently producing zero/empty bytes for
/// anything but `Int`.
fn encode_constant_sample(value: &PropertyValue, sample_type: SampleType) -> Result<Vec<u8>> {
    match (sample_type, value) {
        (SampleType::Int8, PropertyValue::Int(v)) => Ok(vec![*v as i8 as u8]),
        (SampleType::UInt8, PropertyValue::Int(v)) => Ok(vec![*v as u8]),
        (SampleType::Int16, PropertyValue::Int(v)) => Ok((*v as i16).to_le_bytes().to_vec()),
        (SampleType::UInt16, PropertyValue::Int(v)) => Ok((*v as u16).to_le_bytes().to_vec()),
        (SampleType::Int32, PropertyValue::Int(v)) => Ok((*v as i32).to_le_bytes().to_vec()),
        (SampleType::UInt32, PropertyValue::Int(v)) => Ok((*v as u32).to_le_bytes().to_vec()),
        (SampleType::Int64, PropertyValue::Int(v)) => Ok(v.to_le_bytes().to_vec()),
        (SampleType::UInt64, PropertyValue::Int(v)) => Ok((*v as u64).to_le_bytes().to_vec()),
        (SampleType::Float32, PropertyValue::Float(v)) => Ok((*v as f32).to_le_bytes().to_vec()),
        (SampleType::Float32, PropertyValue::Int(v)) => Ok((*v as f32).to_le_bytes().to_vec()),
        (SampleType::Float64, PropertyValue::Float(v)) => Ok(v.to_le_bytes().to_vec()),
        (SampleType::Float64, PropertyValue::Int(v)) => Ok((*v as f64).to_le_bytes().to_vec()),
        _ => Err(Error::InvalidValue {
            property: "value".to_string(),
            reason: format!("constant rule value {value:?} does not match sample type {sample_type:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::connection::OverflowPolicy;
    use crate::signal::descriptor::{DataDescriptor, SampleType};

    fn new_reader(capacity: usize) -> (Arc<Connection>, Reader) {
        let connection = Arc::new(Connection::new(capacity, OverflowPolicy::DropNewest));
        let reader = Reader::new(connection.clone());
        (connection, reader)
    }

    #[test]
    fn explicit_rule_passes_buffer_through_unchanged() {
        let (connection, mut reader) = new_reader(4);
        let descriptor = Arc::new(DataDescriptor::new("sig", SampleType::Int32, Rule::Explicit));
        let buffer: Arc<[u8]> = Arc::from(vec![1, 2, 3, 4, 5, 6, 7, 8]);
        connection
            .send(Packet::Data(DataPacket::new(descriptor, 2, buffer.clone(), 0)))
            .unwrap();

        let result = reader.read().unwrap().unwrap();
        assert_eq!(result.sample_count, 2);
        assert_eq!(result.samples, buffer.to_vec());
    }

    #[test]
    fn linear_rule_expands_into_explicit_samples() {
        let (connection, mut reader) = new_reader(4);
        let descriptor = Arc::new(DataDescriptor::new("sig", SampleType::Int32, Rule::Linear { delta: 2, start: 10 }));
        connection
            .send(Packet::Data(DataPacket::new(descriptor, 3, Arc::from(Vec::new()), 0)))
            .unwrap();

        let result = reader.read().unwrap().unwrap();
        assert_eq!(result.sample_count, 3);
        let values: Vec<i32> = result
            .samples
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![10, 12, 14]);
    }

    #[test]
    fn constant_rule_yields_no_samples_on_first_join_then_expands() {
        let (connection, mut reader) = new_reader(4);
        let descriptor = Arc::new(DataDescriptor::new(
            "sig",
            SampleType::Int32,
            Rule::Constant { value: PropertyValue::Int(7) },
        ));
        connection
            .send(Packet::Data(DataPacket::new(descriptor.clone(), 5, Arc::from(Vec::new()), 0)))
            .unwrap();
        let first = reader.read().unwrap().unwrap();
        assert_eq!(first.sample_count, 0);

        connection
            .send(Packet::Data(DataPacket::new(descriptor, 3, Arc::from(Vec::new()), 5)))
            .unwrap();
        let second = reader.read().unwrap().unwrap();
        assert_eq!(second.sample_count, 3);
        let values: Vec<i32> = second
            .samples
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![7, 7, 7]);
    }

    #[test]
    fn constant_rule_applies_value_changes_at_their_sample_indices() {
        let (connection, mut reader) = new_reader(4);
        let descriptor = Arc::new(DataDescriptor::new(
            "sig",
            SampleType::Int32,
            Rule::Constant { value: PropertyValue::Int(1) },
        ));
        // Prime the reader so the first packet isn't swallowed by the
        // mid-stream-join rule.
        connection
            .send(Packet::Data(DataPacket::new(descriptor.clone(), 0, Arc::from(Vec::new()), 0)))
            .unwrap();
        reader.read().unwrap();

        let packet = DataPacket::new(descriptor, 5, Arc::from(Vec::new()), 0)
            .with_value_changes(vec![(2, PropertyValue::Int(9)), (4, PropertyValue::Int(3))]);
        connection.send(Packet::Data(packet)).unwrap();

        let result = reader.read().unwrap().unwrap();
        assert_eq!(result.sample_count, 5);
        let values: Vec<i32> = result
            .samples
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![1, 1, 9, 9, 3]);
    }

    #[test]
    fn constant_rule_supports_float_sample_types_not_just_int() {
        let (connection, mut reader) = new_reader(4);
        let descriptor = Arc::new(DataDescriptor::new(
            "sig",
            SampleType::Float64,
            Rule::Constant { value: PropertyValue::Float(2.5) },
        ));
        connection
            .send(Packet::Data(DataPacket::new(descriptor.clone(), 0, Arc::from(Vec::new()), 0)))
            .unwrap();
        reader.read().unwrap();

        connection
            .send(Packet::Data(DataPacket::new(descriptor, 3, Arc::from(Vec::new()), 0)))
            .unwrap();
        let result = reader.read().unwrap().unwrap();
        let values: Vec<f64> = result
            .samples
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![2.5, 2.5, 2.5]);
    }

    #[test]
    fn constant_rule_rejects_a_value_incompatible_with_the_sample_type() {
        let (connection, mut reader) = new_reader(4);
        let descriptor = Arc::new(DataDescriptor::new(
            "sig",
            SampleType::Int32,
            Rule::Constant { value: PropertyValue::String("nope".to_string()) },
        ));
        connection
            .send(Packet::Data(DataPacket::new(descriptor.clone(), 0, Arc::from(Vec::new()), 0)))
            .unwrap();
        reader.read().unwrap();

        connection
            .send(Packet::Data(DataPacket::new(descriptor, 1, Arc::from(Vec::new()), 0)))
            .unwrap();
        assert!(reader.read().is_err());
    }

    #[test]
    fn read_returns_none_when_queue_is_empty() {
        let (_connection, mut reader) = new_reader(4);
        assert!(reader.read().unwrap().is_none());
    }

    proptest::proptest! {
        #[test]
        fn linear_rule_expansion_matches_start_plus_delta_times_offset(
            start in -1_000_i64..1_000,
            delta in -100_i64..100,
            offset in 0_usize..50,
            sample_count in 0_usize..20,
        ) {
            let (connection, mut reader) = new_reader(64);
            let descriptor = Arc::new(DataDescriptor::new("sig", SampleType::Int32, Rule::Linear { delta, start }));
            connection
                .send(Packet::Data(DataPacket::new(descriptor, sample_count, Arc::from(Vec::new()), offset)))
                .unwrap();

            let result = reader.read().unwrap().unwrap();
            let values: Vec<i32> = result
                .samples
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
                .collect();
            let expected: Vec<i32> = (0..sample_count).map(|n| (start + delta * (offset + n) as i64) as i32).collect();
            prop_assert_eq!(values, expected);
        }
    }
}
