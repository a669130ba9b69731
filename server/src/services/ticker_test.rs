use super::*;
use crate::state::test_helpers::test_app_state;
use crate::state::Egress;
use packets::Color;
use std::net::IpAddr;
use tokio::sync::mpsc;

fn decode_records(blob: &[u8]) -> Vec<(u16, u16, Color)> {
    assert_eq!(blob.len() % packets::PIXEL_UPDATE_LEN, 0, "whole 8-byte records");
    blob.chunks(packets::PIXEL_UPDATE_LEN)
        .map(|rec| {
            assert_eq!(rec[0], packets::TAG_PIXEL_UPDATE);
            (
                u16::from_le_bytes([rec[1], rec[2]]),
                u16::from_le_bytes([rec[3], rec[4]]),
                Color::new(rec[5], rec[6], rec[7]),
            )
        })
        .collect()
}

#[test]
fn encode_empty_is_empty() {
    assert!(encode_broadcast(&[]).is_empty());
}

#[test]
fn encode_one_record_per_pixel() {
    let blob = encode_broadcast(&[
        DirtyPixel { x: 1, y: 0, color: Color::new(255, 0, 0) },
        DirtyPixel { x: 3, y: 1, color: Color::new(0, 0, 9) },
    ]);

    assert_eq!(blob.len(), 16);
    assert_eq!(
        decode_records(&blob),
        vec![(1, 0, Color::new(255, 0, 0)), (3, 1, Color::new(0, 0, 9))]
    );
}

#[tokio::test]
async fn tick_broadcasts_coalesced_writes_to_all_subscribers() {
    let state = test_app_state();
    let (tx_writer, mut rx_writer) = mpsc::channel(8);
    let (tx_peer, mut rx_peer) = mpsc::channel(8);
    state.connections.register(IpAddr::from([10, 0, 0, 1]), tx_writer);
    state.connections.register(IpAddr::from([10, 0, 0, 2]), tx_peer);

    // Three writes within one tick, (0,0) written twice.
    {
        let mut core = state.core.lock().unwrap();
        core.board.set(0, 0, Color::new(50, 50, 50));
        core.board.set(1, 0, Color::new(4, 5, 6));
        core.board.set(0, 0, Color::new(1, 2, 3));
    }

    run_tick(&state);

    for rx in [&mut rx_writer, &mut rx_peer] {
        let Egress::Flush(blob) = rx.try_recv().unwrap() else {
            panic!("expected a flush");
        };
        let mut records = decode_records(&blob);
        records.sort();
        // Exactly two records: coalesced (0,0) with its final color, plus (1,0).
        assert_eq!(
            records,
            vec![(0, 0, Color::new(1, 2, 3)), (1, 0, Color::new(4, 5, 6))]
        );
    }
}

#[tokio::test]
async fn tick_after_drain_is_silent() {
    let state = test_app_state();
    let (tx, mut rx) = mpsc::channel(8);
    state.connections.register(IpAddr::from([10, 0, 0, 1]), tx);

    state.core.lock().unwrap().board.set(2, 1, Color::new(7, 7, 7));
    run_tick(&state);
    assert!(matches!(rx.try_recv().unwrap(), Egress::Flush(_)));

    // Dirty set was cleared by the drain; the next tick sends nothing.
    run_tick(&state);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn pending_buffer_bytes_ride_along_with_the_broadcast() {
    let state = test_app_state();
    let (tx, mut rx) = mpsc::channel(8);
    let id = state.connections.register(IpAddr::from([10, 0, 0, 1]), tx);

    state
        .connections
        .append(id, &packets::encode_paint_result(7, packets::ResultCode::Success));
    state.core.lock().unwrap().board.set(1, 0, Color::new(255, 0, 0));

    run_tick(&state);

    let Egress::Flush(bytes) = rx.try_recv().unwrap() else {
        panic!("expected a flush");
    };
    // One message: 6-byte result then the 8-byte broadcast record.
    assert_eq!(
        bytes,
        vec![0xFF, 0x07, 0x00, 0x00, 0x00, 0xEF, 0xFA, 0x01, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00]
    );
    assert!(rx.try_recv().is_err());
}
