//! Tab-separated side tables: chromosome rename maps in, amplicon tables out.
use std::collections::HashMap;
use std::io::{Read, Write};

use anyhow::{bail, Context};

use crate::scheme::Scheme;

/// Which span an amplicon table row describes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TableKind {
    /// Outer bounds, primers included.
    #[default]
    Amplicon,
    /// The insert left after primer trimming.
    Primertrim,
}

/// Read a headerless `old<TAB>new` chromosome map. `#` lines are comments.
pub fn read_chrom_map<R: Read>(reader: R) -> anyhow::Result<HashMap<String, String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut map = HashMap::new();
    for (i, rec) in rdr.records().enumerate() {
        let r = rec.with_context(|| format!("reading chromosome map row {}", i + 1))?;
        if r.len() < 2 || r[0].is_empty() || r[1].is_empty() {
            bail!("chromosome map row {} needs two columns, found {:?}", i + 1, r);
        }
        if let Some(prev) = map.insert(r[0].to_string(), r[1].to_string()) {
            bail!("chromosome '{}' is mapped twice ('{}' and '{}')", &r[0], prev, &r[1]);
        }
    }
    Ok(map)
}

/// Write one `chrom, start, end, name, pool` row per amplicon.
pub fn write_amplicon_table<W: Write>(scheme: &Scheme, kind: TableKind, writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).delimiter(b'\t').from_writer(writer);
    for a in scheme.amplicons() {
        let (start, end) = match kind {
            TableKind::Amplicon => (a.amplicon_start(), a.amplicon_end()),
            TableKind::Primertrim => (a.insert_start(), a.insert_end()),
        };
        wtr.write_record([a.chrom().to_string(), start.to_string(), end.to_string(), a.name(), a.pool().to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod table_tests {
    use super::*;
    use crate::amplicon::Amplicon;
    use crate::bedline::BedLine;

    #[test]
    fn reads_map_with_comments() {
        let m = read_chrom_map("# old\tnew\nchr1\tNC_000001\n chr2 \tNC_000002\n".as_bytes()).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m["chr2"], "NC_000002");
    }

    #[test]
    fn rejects_short_and_repeated_rows() {
        assert!(read_chrom_map("chr1\n".as_bytes()).is_err());
        assert!(read_chrom_map("chr1\ta\nchr1\tb\n".as_bytes()).is_err());
    }

    #[test]
    fn writes_both_spans() {
        let bl = |s: &str| BedLine::parse_line(s, 1).unwrap();
        let a = Amplicon::new(vec![bl("c\t100\t120\ts_1_LEFT\t2\t+")], vec![bl("c\t200\t220\ts_1_RIGHT\t2\t-")]).unwrap();
        let s = Scheme::canonical(vec![], vec![a], vec![]);

        let mut buf = Vec::new();
        write_amplicon_table(&s, TableKind::Amplicon, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "c\t100\t220\ts_1\t2\n");

        let mut buf = Vec::new();
        write_amplicon_table(&s, TableKind::Primertrim, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "c\t120\t200\ts_1\t2\n");
    }
}
