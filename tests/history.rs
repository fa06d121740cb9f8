use livespectrum::data::history::HistoryBuffer;
use livespectrum::SpectrumFrame;

fn frame(index: usize, bins: usize) -> SpectrumFrame {
    SpectrumFrame::new(
        100e6 + index as f64,
        2.4e6,
        (0..bins).map(|b| (index * 3 + b) as f32 * -0.01).collect(),
    )
}

#[test]
fn wraps_after_more_frames_than_depth() {
    let mut history = HistoryBuffer::new(1024);
    for i in 0..1200 {
        assert!(history.ingest(frame(i, 512)));
    }
    assert_eq!(history.slice_ptr(), 176);
    assert_eq!(history.rows_filled(), 1024);
    assert_eq!(history.bin_count(), 512);

    for k in [0usize, 1, 175, 176, 500, 1023] {
        let row = history.row_at(k).expect("row inside the filled range");
        let expected = frame(1199 - k, 512);
        assert_eq!(row.center_freq, expected.center_freq, "row {k}");
        assert_eq!(row.amplitudes, expected.bins.as_slice(), "row {k}");
        assert_eq!(row.slot, (176 + 1024 - 1 - k) % 1024);
    }
    assert!(history.row_at(1024).is_none());
}

#[test]
fn oldest_first_iteration_ends_at_newest() {
    let mut history = HistoryBuffer::new(4);
    for i in 0..6 {
        history.ingest(frame(i, 8));
    }
    let centers: Vec<f64> = history.iter_oldest_first().map(|r| r.center_freq).collect();
    assert_eq!(centers, vec![100e6 + 2.0, 100e6 + 3.0, 100e6 + 4.0, 100e6 + 5.0]);
}

#[test]
fn bin_count_change_discards_history() {
    let mut history = HistoryBuffer::new(16);
    for i in 0..10 {
        history.ingest(frame(i, 256));
    }
    let generation = history.generation();

    assert!(history.ingest(frame(10, 128)));
    assert_eq!(history.rows_filled(), 1);
    assert_eq!(history.bin_count(), 128);
    assert_eq!(history.slice_ptr(), 1);
    assert!(history.generation() > generation);
    assert!(history.row_at(1).is_none());
    // slots written before the reallocation read as empty
    assert!(history.slot(5).is_none());
}

#[test]
fn empty_frames_are_ignored() {
    let mut history = HistoryBuffer::new(4);
    assert!(!history.ingest(SpectrumFrame::new(0.0, 1.0, Vec::new())));
    assert!(history.is_empty());
    assert_eq!(history.generation(), 0);
}

#[test]
fn growing_keeps_rows_in_order() {
    let mut history = HistoryBuffer::new(4);
    for i in 0..6 {
        history.ingest(frame(i, 8));
    }
    history.resize_capacity(10);
    assert_eq!(history.capacity(), 10);
    assert_eq!(history.rows_filled(), 4);
    assert_eq!(history.newest().map(|r| r.center_freq), Some(100e6 + 5.0));
    history.ingest(frame(6, 8));
    assert_eq!(history.row_at(1).map(|r| r.center_freq), Some(100e6 + 5.0));
    assert_eq!(history.row_at(4).map(|r| r.center_freq), Some(100e6 + 2.0));
}
