//! GPX 1.1 track output.
//!
//! Values are written as raw text. Coordinates and times never need escaping,
//! and the pass-through extension values are emitted exactly as the recorder
//! wrote them.

use crate::{ConvertError, LocationPoint};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::Value;
use std::io::{self, Write};
use tracing::debug;

const CREATOR: &str = "OwnTracks-Rec-to-GPX-Converter";
const TRACK_NAME: &str = "OwnTracks Recorder Track";
const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd";
const OWNTRACKS_NAMESPACE: &str = "http://owntracks.org/gpx/1/0";

pub fn encode_gpx(points: &[LocationPoint]) -> Result<String, ConvertError> {
    let mut output = Vec::new();
    write_gpx(points, &mut output)?;

    debug!(points = points.len(), bytes = output.len(), "encoded GPX");

    String::from_utf8(output)
        .map_err(|e| ConvertError::Encode(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Writes a single-track, single-segment GPX document.
pub fn write_gpx<W: Write>(points: &[LocationPoint], output: W) -> Result<(), ConvertError> {
    let mut writer = Writer::new_with_indent(output, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;

    let mut gpx = BytesStart::new("gpx");
    gpx.push_attribute(("version", "1.1"));
    gpx.push_attribute(("creator", CREATOR));
    gpx.push_attribute(("xmlns", GPX_NAMESPACE));
    gpx.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
    gpx.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    gpx.push_attribute(("xmlns:owntracks", OWNTRACKS_NAMESPACE));
    writer.write_event(Event::Start(gpx))?;

    writer.write_event(Event::Start(BytesStart::new("trk")))?;
    write_text_element(&mut writer, "name", TRACK_NAME)?;
    writer.write_event(Event::Start(BytesStart::new("trkseg")))?;

    for point in points {
        write_trkpt(&mut writer, point)?;
    }

    writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
    writer.write_event(Event::End(BytesEnd::new("trk")))?;
    writer.write_event(Event::End(BytesEnd::new("gpx")))?;

    Ok(())
}

fn write_trkpt<W: Write>(writer: &mut Writer<W>, point: &LocationPoint) -> io::Result<()> {
    let mut trkpt = BytesStart::new("trkpt");
    trkpt.push_attribute(("lat", point.lat.to_string().as_str()));
    trkpt.push_attribute(("lon", point.lon.to_string().as_str()));
    writer.write_event(Event::Start(trkpt))?;

    write_text_element(writer, "ele", &point.elevation.to_string())?;
    write_text_element(writer, "time", &point.iso_time)?;

    if !point.extras.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("extensions")))?;
        for (name, value) in point.extras.fields() {
            write_text_element(writer, &format!("owntracks:{name}"), &raw_text(value))?;
        }
        writer.write_event(Event::End(BytesEnd::new("extensions")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("trkpt")))
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

// Strings lose their quotes, everything else is written as JSON text. Arrays
// and objects therefore come out as JSON rather than a flattened form.
fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
