//! # QR Round Trip
//!
//! The QR code printed on a ticket must decode back to the record's payload.
//! Tickets are composed and rendered exactly as for printing, then the
//! bitmap is scanned with an independent reader.

mod common;

use boleta::layout::{Composer, ComposerConfig, FooterFragment};
use boleta::qr::QrErrorLevel;
use boleta::render::{CanvasConfig, Renderer};
use boleta::{TicketBitmap, TicketRecord};
use common::ticket;

fn scan(bitmap: &TicketBitmap) -> Vec<String> {
    let mut image = rqrr::PreparedImage::prepare_from_greyscale(
        bitmap.width() as usize,
        bitmap.height() as usize,
        |x, y| {
            if bitmap.is_black(x as u32, y as u32) {
                0
            } else {
                255
            }
        },
    );
    image
        .detect_grids()
        .into_iter()
        .filter_map(|grid| grid.decode().ok())
        .map(|(_, content)| content)
        .collect()
}

fn render(record: &TicketRecord, config: ComposerConfig, footer: Option<&FooterFragment>) -> TicketBitmap {
    let plan = Composer::new(config).compose(record, footer).unwrap();
    Renderer::new(CanvasConfig::default()).render(plan).unwrap()
}

#[test]
fn payload_survives_print_path() {
    let payloads = [
        "https://tickets.example.com/A-1001".to_string(),
        "1234567890".to_string(),
        "EVENT:2024-06-01;SEAT:12B;GATE:4".to_string(),
        format!("https://example.com/verify?token={}", "a1b2c3d4".repeat(20)),
    ];

    for payload in payloads {
        let record = TicketRecord::new("rt", payload.clone())
            .item("Adult", "25.00")
            .total_cents(2500);
        let bitmap = render(&record, ComposerConfig::default(), None);
        assert_eq!(scan(&bitmap), vec![payload]);
    }
}

#[test]
fn every_error_correction_level_decodes() {
    let record = ticket("levels");
    for level in [QrErrorLevel::L, QrErrorLevel::M, QrErrorLevel::Q, QrErrorLevel::H] {
        let config = ComposerConfig {
            qr_error_level: level,
            ..Default::default()
        };
        let bitmap = render(&record, config, None);
        assert_eq!(scan(&bitmap), vec![record.qr_payload.clone()], "{:?}", level);
    }
}

#[test]
fn footer_does_not_disturb_qr() {
    let record = ticket("footer");
    let footer = FooterFragment::new()
        .rule()
        .bold_text("THANK YOU")
        .text("Keep this ticket until the end of the event");
    let bitmap = render(&record, ComposerConfig::default(), Some(&footer));
    assert_eq!(scan(&bitmap), vec![record.qr_payload.clone()]);
}

#[test]
fn small_modules_still_decode() {
    let record = ticket("small");
    let config = ComposerConfig {
        qr_module_px: 2,
        ..Default::default()
    };
    let bitmap = render(&record, config, None);
    assert_eq!(scan(&bitmap), vec![record.qr_payload.clone()]);
}
