//! Wire-Format fuer TCP-Verbindungen
//!
//! Zeilenbasiertes Protokoll: jede Nachricht ist eine ASCII-Zeile,
//! abgeschlossen durch einen festen Trenner (Standard: CRLF).
//!
//! ## Frame-Format
//!
//! ```text
//! <praefix><feld>:<feld>:...:<feld>\r\n
//! ```
//!
//! Leere Zeilen werden uebersprungen. Ein unvollstaendiger Rest am Ende des
//! Streams wird trotzdem als letzte Zeile ausgeliefert. Nur eine zu lange
//! Zeile beendet den Stream mit einem Fehler.

use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::ZEILENENDE;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Zeilenlaenge (4 KB)
pub const DEFAULT_MAX_ZEILENLAENGE: usize = 4 * 1024;

// ---------------------------------------------------------------------------
// ZeilenCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer das FSD-Zeilenprotokoll
///
/// Dekodiert zu `String` (ohne Trenner), kodiert `&str`/`String` und haengt
/// den Trenner an falls er fehlt.
#[derive(Debug, Clone)]
pub struct ZeilenCodec {
    trenner: Vec<u8>,
    max_zeilenlaenge: usize,
    /// Bis hierhin wurde der Puffer bereits erfolglos nach dem Trenner durchsucht
    gesucht_bis: usize,
}

impl ZeilenCodec {
    /// Codec mit CRLF und Standard-Limit
    pub fn new() -> Self {
        Self::mit_trenner(ZEILENENDE, DEFAULT_MAX_ZEILENLAENGE)
    }

    /// Codec mit eigenem Trenner und Limit
    ///
    /// Ein leerer Trenner faellt auf CRLF zurueck.
    pub fn mit_trenner(trenner: &str, max_zeilenlaenge: usize) -> Self {
        let trenner = if trenner.is_empty() { ZEILENENDE } else { trenner };
        Self {
            trenner: trenner.as_bytes().to_vec(),
            max_zeilenlaenge,
            gesucht_bis: 0,
        }
    }

    pub fn max_zeilenlaenge(&self) -> usize {
        self.max_zeilenlaenge
    }

    pub fn trenner(&self) -> &[u8] {
        &self.trenner
    }

    fn trenner_finden(&self, puffer: &[u8]) -> Option<usize> {
        // Ein Trenner kann ueber die alte Suchgrenze hinweg beginnen
        let start = self.gesucht_bis.saturating_sub(self.trenner.len() - 1);
        puffer[start..]
            .windows(self.trenner.len())
            .position(|fenster| fenster == self.trenner.as_slice())
            .map(|i| start + i)
    }

    /// UTF-8, sonst Latin-1
    ///
    /// Aeltere Clients schicken Namen und Texte in ihrer Windows-Codepage.
    /// Jedes Byte ist ein gueltiges Latin-1-Zeichen, die Zeile geht also
    /// nie verloren.
    fn zeile_aus_bytes(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(zeile) => zeile.to_string(),
            Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl Default for ZeilenCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for ZeilenCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = self.trenner_finden(src) else {
                if src.len() > self.max_zeilenlaenge {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Zeile zu lang: {} Bytes (Maximum: {} Bytes)",
                            src.len(),
                            self.max_zeilenlaenge
                        ),
                    ));
                }
                self.gesucht_bis = src.len();
                return Ok(None);
            };

            self.gesucht_bis = 0;
            let zeile = src.split_to(pos);
            let _ = src.split_to(self.trenner.len());

            if zeile.len() > self.max_zeilenlaenge {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Zeile zu lang: {} Bytes (Maximum: {} Bytes)",
                        zeile.len(),
                        self.max_zeilenlaenge
                    ),
                ));
            }

            // Leere Zeilen ueberspringen
            if zeile.is_empty() {
                continue;
            }
            return Ok(Some(Self::zeile_aus_bytes(&zeile)));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(zeile) = self.decode(buf)? {
            return Ok(Some(zeile));
        }
        // Rest ohne Trenner trotzdem ausliefern
        self.gesucht_bis = 0;
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        Ok(Some(Self::zeile_aus_bytes(&rest)))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl<T: AsRef<str>> Encoder<T> for ZeilenCodec {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let zeile = item.as_ref().as_bytes();
        let hat_trenner = zeile.ends_with(&self.trenner);

        dst.reserve(zeile.len() + self.trenner.len());
        dst.put_slice(zeile);
        if !hat_trenner {
            dst.put_slice(&self.trenner);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Haengt CRLF an falls die Zeile noch keinen Abschluss hat
pub fn mit_zeilenende(zeile: &str) -> String {
    if zeile.ends_with(ZEILENENDE) {
        zeile.to_string()
    } else {
        format!("{zeile}{ZEILENENDE}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
