/// One segment of an `AS_PATH` or `AS4_PATH` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsPathSegment {
    AsSequence(Vec<u32>),
    AsSet(Vec<u32>),
    /// <https://datatracker.ietf.org/doc/html/rfc5065>
    ConfedSequence(Vec<u32>),
    ConfedSet(Vec<u32>),
}

impl AsPathSegment {
    /// Number of ASNs this segment contributes to the path length (RFC 4271 9.1.2.2).
    fn route_len(&self) -> usize {
        match self {
            AsPathSegment::AsSequence(v) => v.len(),
            AsPathSegment::AsSet(_) => 1,
            AsPathSegment::ConfedSequence(_) | AsPathSegment::ConfedSet(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AsPath {
    pub segments: Vec<AsPathSegment>,
}

impl AsPath {
    pub fn from_sequence<I: IntoIterator<Item = u32>>(asns: I) -> AsPath {
        AsPath {
            segments: vec![AsPathSegment::AsSequence(asns.into_iter().collect())],
        }
    }

    pub fn append_segment(&mut self, segment: AsPathSegment) {
        self.segments.push(segment);
    }

    pub fn route_len(&self) -> usize {
        self.segments.iter().map(AsPathSegment::route_len).sum()
    }

    /// Flatten the path into a list of ASNs.
    ///
    /// Sequences contribute all their ASNs. Sets are unordered, only their first ASN is kept so
    /// the last element stays a usable origin.
    pub fn flatten(&self) -> Vec<u32> {
        let mut output = Vec::with_capacity(self.route_len());
        for segment in &self.segments {
            match segment {
                AsPathSegment::AsSequence(v) | AsPathSegment::ConfedSequence(v) => {
                    output.extend_from_slice(v)
                }
                AsPathSegment::AsSet(v) | AsPathSegment::ConfedSet(v) => {
                    if let Some(first) = v.first() {
                        output.push(*first);
                    }
                }
            }
        }
        output
    }

    /// Reconstruct the real path from a 2-octet `AS_PATH` and its `AS4_PATH`.
    ///
    /// <https://datatracker.ietf.org/doc/html/rfc6793#section-4.2.3>
    pub fn merge_aspath_as4path(aspath: &AsPath, as4path: &AsPath) -> AsPath {
        let as_len = aspath.route_len();
        let as4_len = as4path.route_len();
        if as_len < as4_len {
            return aspath.clone();
        }

        let mut keep = as_len - as4_len;
        let mut segments = Vec::with_capacity(aspath.segments.len() + as4path.segments.len());
        for segment in &aspath.segments {
            if keep == 0 {
                break;
            }
            match segment {
                AsPathSegment::AsSequence(v) if v.len() > keep => {
                    segments.push(AsPathSegment::AsSequence(v[..keep].to_vec()));
                    keep = 0;
                }
                _ => {
                    keep -= segment.route_len();
                    segments.push(segment.clone());
                }
            }
        }
        segments.extend(as4path.segments.iter().cloned());
        AsPath { segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten() {
        let cases = [
            (vec![], vec![]),
            (
                vec![AsPathSegment::AsSequence(vec![65402, 65403, 65404])],
                vec![65402, 65403, 65404],
            ),
            (
                vec![AsPathSegment::AsSet(vec![65402, 65403, 65404])],
                vec![65402],
            ),
            (
                vec![AsPathSegment::ConfedSequence(vec![65402, 65403, 65404])],
                vec![65402, 65403, 65404],
            ),
            (
                vec![AsPathSegment::ConfedSet(vec![65402, 65403, 65404])],
                vec![65402],
            ),
            (
                vec![
                    AsPathSegment::AsSequence(vec![65402, 65403, 65404]),
                    AsPathSegment::AsSet(vec![65405, 65406]),
                    AsPathSegment::ConfedSequence(vec![65407, 65408]),
                    AsPathSegment::ConfedSet(vec![65409, 65410]),
                    AsPathSegment::AsSequence(vec![65411]),
                ],
                vec![65402, 65403, 65404, 65405, 65407, 65408, 65409, 65411],
            ),
        ];
        for (segments, expected) in cases {
            assert_eq!(AsPath { segments }.flatten(), expected);
        }
    }

    #[test]
    fn test_merge_aspath_as4path() {
        let aspath = AsPath::from_sequence([1, 2, 3, 23456, 23456]);
        let as4path = AsPath::from_sequence([4_000_000, 4_000_001]);
        let merged = AsPath::merge_aspath_as4path(&aspath, &as4path);
        assert_eq!(merged.flatten(), vec![1, 2, 3, 4_000_000, 4_000_001]);

        // AS4_PATH longer than AS_PATH is ignored
        let aspath = AsPath::from_sequence([1]);
        let as4path = AsPath::from_sequence([4_000_000, 4_000_001]);
        let merged = AsPath::merge_aspath_as4path(&aspath, &as4path);
        assert_eq!(merged.flatten(), vec![1]);
    }
}
