//! Property: every path round-trips through its canonical string.

use dyad_vpath::VPath;
use proptest::prelude::*;

fn arb_segment() -> impl Strategy<Value = String> {
	// Path-safe segments, including spaces and unicode; the leading
	// alphanumeric keeps `.` and `..` out of the pool.
	proptest::string::string_regex("[a-zA-Z0-9][a-zA-Z0-9 ._\\-\u{00e9}\u{4e16}]{0,11}").unwrap()
}

fn arb_segments(max: usize) -> impl Strategy<Value = Vec<String>> {
	proptest::collection::vec(arb_segment(), 0..max)
}

proptest! {
	#[test]
	fn local_round_trip(segments in arb_segments(6)) {
		let path = VPath::local(format!("/{}", segments.join("/")));
		prop_assert_eq!(VPath::parse(&path.to_string()).unwrap(), path);
	}

	#[test]
	fn archive_round_trip(host in arb_segments(3), inner in arb_segments(4)) {
		let path = VPath::archive_entry(format!("/{}.zip", host.join("/")), inner.join("/"));
		prop_assert_eq!(VPath::parse(&path.to_string()).unwrap(), path);
	}

	#[test]
	fn s3_round_trip(bucket in arb_segment(), key in arb_segments(4)) {
		let path = VPath::s3(bucket, key.join("/"));
		prop_assert_eq!(VPath::parse(&path.to_string()).unwrap(), path);
	}

	#[test]
	fn sftp_round_trip(host in arb_segment(), segments in arb_segments(4)) {
		let path = VPath::sftp(host, format!("/{}", segments.join("/")));
		prop_assert_eq!(VPath::parse(&path.to_string()).unwrap(), path);
	}

	#[test]
	fn join_then_parent_is_identity(segments in arb_segments(4), leaf in arb_segment()) {
		let base = VPath::local(format!("/{}", segments.join("/")));
		let joined = base.join(&leaf);
		prop_assert_eq!(joined.parent().unwrap(), base);
		prop_assert_eq!(joined.name(), leaf);
	}
}
