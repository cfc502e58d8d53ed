use segtrack::{identify, Error, Track};

#[test]
fn basic_write_and_read_round_trip() {
    let mut track = Track::new();
    track.write(&[1, 2, 3, 4, 5, 6, 7, 8], 0).unwrap();
    assert_eq!(track.length(), 8);

    let mut buf = [0i16; 8];
    assert_eq!(track.read(&mut buf, 0), 8);
    assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn overwrite_then_append_extends_length() {
    let mut track = Track::new();
    track.write(&[1, 2, 3, 4], 0).unwrap();
    track.write(&[10, 20, 30, 40, 50], 2).unwrap();

    assert_eq!(track.length(), 7);
    let mut buf = [0i16; 7];
    track.read(&mut buf, 0);
    assert_eq!(buf, [1, 2, 10, 20, 30, 40, 50]);
}

#[test]
fn write_past_end_is_rejected_and_leaves_state_untouched() {
    let mut track = Track::new();
    track.write(&[1, 2, 3], 0).unwrap();

    let err = track.write(&[9, 9], 5).unwrap_err();
    assert!(matches!(err, Error::WriteBeyondEnd { pos: 5, length: 3 }));
    assert_eq!(track.length(), 3);
}

#[test]
fn delete_is_refused_while_a_view_exists_and_succeeds_after() {
    let (mut src, mut dst) = Track::pair();
    src.write(&[1, 2, 3, 4, 5, 6], 0).unwrap();

    dst.insert(&mut src, 0, 2, 2).unwrap(); // dst aliases src[2..4]

    assert_eq!(src.delete_range(2, 2).unwrap(), false);
    assert_eq!(src.delete_range(0, 2).unwrap(), true);

    let mut buf = [0i16; 4];
    src.read(&mut buf, 0);
    assert_eq!(buf, [3, 4, 5, 6]);

    // dst's view into src[2..4] (now src[0..2] after the delete) is untouched.
    let mut dst_buf = [0i16; 2];
    dst.read(&mut dst_buf, 0);
    assert_eq!(dst_buf, [3, 4]);
}

#[test]
fn insert_aliases_rather_than_copies() {
    let (mut src, mut dst) = Track::pair();
    src.write(&[1, 2, 3, 4], 0).unwrap();
    dst.write(&[100, 200], 0).unwrap();

    dst.insert(&mut src, 1, 1, 2).unwrap();
    let mut dst_buf = [0i16; 4];
    dst.read(&mut dst_buf, 0);
    assert_eq!(dst_buf, [100, 2, 3, 200]);

    // A write through the aliased view in dst is visible back in src.
    dst.write(&[77], 1).unwrap();
    let mut src_buf = [0i16; 4];
    src.read(&mut src_buf, 0);
    assert_eq!(src_buf, [1, 77, 3, 4]);
}

#[test]
fn insert_between_unrelated_tracks_is_rejected() {
    let mut a = Track::new();
    let mut b = Track::new();
    a.write(&[1, 2, 3], 0).unwrap();

    let err = b.insert(&mut a, 0, 0, 2).unwrap_err();
    assert!(matches!(err, Error::UnrelatedTracks));
}

#[test]
fn split_keeps_both_halves_of_an_aliased_family_consistent() {
    let (mut src, mut dst) = Track::pair();
    src.write(&(0..10).collect::<Vec<i16>>(), 0).unwrap();
    dst.insert(&mut src, 0, 0, 10).unwrap(); // dst aliases all of src

    // Splitting src in the middle (via a delete that only touches one side)
    // must not disturb dst's view of the untouched side.
    assert_eq!(src.delete_range(0, 10).unwrap(), false);

    let mut dst_buf = [0i16; 10];
    dst.read(&mut dst_buf, 0);
    assert_eq!(dst_buf, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn identify_locates_an_ad_inserted_into_a_program() {
    let mut program = Track::new();
    program
        .write(&[3, -1, 4, 1, 5, 9, 2, 6, 0, 0, 0, 0, 3, -1, 4, 1, 5, 9], 0)
        .unwrap();
    let mut ad = Track::new();
    ad.write(&[3, -1, 4, 1, 5, 9], 0).unwrap();

    let matches = identify(&program, &ad);
    assert_eq!(matches, "0,5\n12,17");
}

#[test]
fn identify_returns_empty_string_when_no_match() {
    let mut program = Track::new();
    program.write(&[1, 1, 1, 1], 0).unwrap();
    let mut ad = Track::new();
    ad.write(&[9, -9, 9, -9], 0).unwrap();

    assert_eq!(identify(&program, &ad), "");
}
