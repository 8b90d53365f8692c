//! KML export (OGC KML 2.2) for Google Earth and similar viewers.
//!
//! The document defines one shared style per placemark role and emits the
//! same content as the GeoJSON export: the estimate, the error region, the
//! receivers, and the measurement baselines. KML coordinate order is
//! longitude,latitude[,altitude].

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::export::{export_error, RESULT_TITLE};
use crate::geo::{self, Location};
use crate::processor::LocationResult;

/// Vertices of the error-region ring (closed by repeating the first).
const ERROR_RING_VERTICES: usize = 36;

/// Serialize the result as a KML file.
pub fn write_kml(result: &LocationResult, path: &Path) -> Result<()> {
    let document = build_document(result);
    std::fs::write(path, document)
        .map_err(|e| export_error(&format!("failed to write '{}'", path.display()), e))
}

pub(crate) fn build_document(result: &LocationResult) -> String {
    let mut kml = String::new();
    kml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    kml.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n");
    kml.push_str("<Document>\n");
    let _ = writeln!(kml, "  <name>{}</name>", escape_xml(RESULT_TITLE));
    let _ = writeln!(
        kml,
        "  <description>{} MHz, {}, confidence {:.2}, processed {}</description>",
        result.frequency_hz as f64 / 1e6,
        escape_xml(result.algorithm.as_str()),
        result.confidence,
        result.processing_time.to_rfc3339(),
    );
    kml.push_str(STYLES);

    push_transmitter(&mut kml, result);
    push_error_region(&mut kml, result);
    for receiver in &result.receivers {
        push_placemark(
            &mut kml,
            &receiver.id,
            "#receiver",
            &format!(
                "SNR {:.1} dB, source {}",
                receiver.snr_db,
                escape_xml(&receiver.source_file)
            ),
            &receiver.location,
        );
    }
    push_baselines(&mut kml, result);

    kml.push_str("</Document>\n");
    kml.push_str("</kml>\n");
    kml
}

const STYLES: &str = r#"  <Style id="transmitter">
    <IconStyle>
      <color>ff0000ff</color>
      <scale>1.4</scale>
    </IconStyle>
  </Style>
  <Style id="receiver">
    <IconStyle>
      <color>ffff0000</color>
      <scale>1.0</scale>
    </IconStyle>
  </Style>
  <Style id="baseline">
    <LineStyle>
      <color>7f00ffff</color>
      <width>2</width>
    </LineStyle>
  </Style>
  <Style id="errorRegion">
    <LineStyle>
      <color>7f0000ff</color>
      <width>2</width>
    </LineStyle>
    <PolyStyle>
      <color>330000ff</color>
    </PolyStyle>
  </Style>
"#;

fn push_transmitter(kml: &mut String, result: &LocationResult) {
    push_placemark(
        kml,
        "Estimated transmitter",
        "#transmitter",
        &format!(
            "Confidence {:.2}, error radius {:.0} m",
            result.confidence, result.error_radius_m
        ),
        &result.location,
    );
}

fn push_placemark(kml: &mut String, name: &str, style: &str, description: &str, at: &Location) {
    let _ = writeln!(kml, "  <Placemark>");
    let _ = writeln!(kml, "    <name>{}</name>", escape_xml(name));
    let _ = writeln!(kml, "    <styleUrl>{style}</styleUrl>");
    let _ = writeln!(
        kml,
        "    <description>{}</description>",
        escape_xml(description)
    );
    let _ = writeln!(kml, "    <Point>");
    let _ = writeln!(kml, "      <coordinates>{}</coordinates>", coordinate(at));
    let _ = writeln!(kml, "    </Point>");
    let _ = writeln!(kml, "  </Placemark>");
}

fn push_error_region(kml: &mut String, result: &LocationResult) {
    let ring = geo::circle_vertices(&result.location, result.error_radius_m, ERROR_RING_VERTICES);
    let _ = writeln!(kml, "  <Placemark>");
    let _ = writeln!(kml, "    <name>Error region</name>");
    let _ = writeln!(kml, "    <styleUrl>#errorRegion</styleUrl>");
    let _ = writeln!(kml, "    <Polygon>");
    let _ = writeln!(kml, "      <outerBoundaryIs>");
    let _ = writeln!(kml, "        <LinearRing>");
    let _ = write!(kml, "          <coordinates>");
    for vertex in &ring {
        let _ = write!(kml, "{} ", coordinate(vertex));
    }
    // LinearRings close explicitly.
    if let Some(first) = ring.first() {
        let _ = write!(kml, "{}", coordinate(first));
    }
    let _ = writeln!(kml, "</coordinates>");
    let _ = writeln!(kml, "        </LinearRing>");
    let _ = writeln!(kml, "      </outerBoundaryIs>");
    let _ = writeln!(kml, "    </Polygon>");
    let _ = writeln!(kml, "  </Placemark>");
}

fn push_baselines(kml: &mut String, result: &LocationResult) {
    for measurement in &result.measurements {
        let endpoint = |id: &str| {
            result
                .receivers
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.location)
        };
        let (Some(first), Some(second)) = (
            endpoint(&measurement.receiver1_id),
            endpoint(&measurement.receiver2_id),
        ) else {
            continue;
        };

        let _ = writeln!(kml, "  <Placemark>");
        let _ = writeln!(
            kml,
            "    <name>Baseline {}-{}</name>",
            escape_xml(&measurement.receiver1_id),
            escape_xml(&measurement.receiver2_id)
        );
        let _ = writeln!(kml, "    <styleUrl>#baseline</styleUrl>");
        let _ = writeln!(
            kml,
            "    <description>TDOA {:.0} ns, range difference {:.1} m, confidence {:.2}</description>",
            measurement.time_diff_ns, measurement.distance_diff_m, measurement.confidence
        );
        let _ = writeln!(kml, "    <LineString>");
        let _ = writeln!(
            kml,
            "      <coordinates>{} {}</coordinates>",
            coordinate(&first),
            coordinate(&second)
        );
        let _ = writeln!(kml, "    </LineString>");
        let _ = writeln!(kml, "  </Placemark>");
    }
}

fn coordinate(location: &Location) -> String {
    format!(
        "{},{},{}",
        location.longitude, location.latitude, location.altitude
    )
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_document_structure() {
        let result = testutil::sample_result();
        let document = build_document(&result);

        assert!(document.starts_with("<?xml version=\"1.0\""));
        assert!(document.contains("<kml xmlns=\"http://www.opengis.net/kml/2.2\">"));
        assert!(document.ends_with("</kml>\n"));
        assert_eq!(document.matches("<Placemark>").count(), 8); // 1 tx + 1 region + 3 rx + 3 baselines
        assert_eq!(
            document.matches("<Placemark>").count(),
            document.matches("</Placemark>").count()
        );
    }

    #[test]
    fn test_error_ring_vertex_count_and_closure() {
        let result = testutil::sample_result();
        let document = build_document(&result);

        let ring = document
            .split("<LinearRing>")
            .nth(1)
            .and_then(|s| s.split("<coordinates>").nth(1))
            .and_then(|s| s.split("</coordinates>").next())
            .unwrap();
        let coordinates: Vec<&str> = ring.split_whitespace().collect();
        assert_eq!(coordinates.len(), ERROR_RING_VERTICES + 1);
        assert_eq!(coordinates.first(), coordinates.last());
    }

    #[test]
    fn test_xml_escaping() {
        assert_eq!(escape_xml("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.kml");
        write_kml(&testutil::sample_result(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Estimated transmitter"));
        assert!(content.contains("Baseline R1-R2"));
    }
}
