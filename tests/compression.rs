#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
mod compression_tests {
    use std::io::{BufRead, BufReader, Write};
    use std::path::Path;
    use tempfile::tempdir;
    use textdb::Compression;
    use textdb::io::compression::{FinishWrite, auto_detect_reader, auto_detect_writer};
    use textdb::io::lines::{create_writer, read_lines};

    fn sample_lines() -> Vec<String> {
        vec!["hello\t5".to_string(), "world\t2".to_string(), "naïve\t1".to_string()]
    }

    fn write_lines(path: &Path) -> anyhow::Result<()> {
        let mut w = create_writer(path)?;
        for line in sample_lines() {
            writeln!(w, "{line}")?;
        }
        w.finish()?;
        Ok(())
    }

    fn roundtrip(compression: Compression) -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(format!("c-data.txt{}", compression.extension()));
        write_lines(&path)?;
        let back = read_lines(&path)?.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(back, sample_lines(), "{compression}");

        // Same bytes without the extension are recognised by their magic number.
        let bare = dir.path().join("no-extension");
        std::fs::copy(&path, &bare)?;
        let back = read_lines(&bare)?.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(back, sample_lines(), "{compression} by magic");
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_roundtrip() -> anyhow::Result<()> {
        roundtrip(Compression::Gzip)
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn test_bzip2_roundtrip() -> anyhow::Result<()> {
        roundtrip(Compression::Bzip2)
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn test_zstd_roundtrip() -> anyhow::Result<()> {
        roundtrip(Compression::Zstd)
    }

    #[cfg(feature = "compression-xz")]
    #[test]
    fn test_xz_roundtrip() -> anyhow::Result<()> {
        roundtrip(Compression::Xz)
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_concatenated_gzip_members() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("multi.txt.gz");
        let mut bytes = Vec::new();
        for chunk in ["a\t1\n", "b\t2\n"] {
            let part = dir.path().join("part.gz");
            let mut w = auto_detect_writer(std::fs::File::create(&part)?, &part)?;
            w.write_all(chunk.as_bytes())?;
            w.finish()?;
            bytes.extend(std::fs::read(&part)?);
        }
        std::fs::write(&path, bytes)?;

        let r = auto_detect_reader(std::fs::File::open(&path)?, &path)?;
        let lines = BufReader::new(r).lines().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(lines, vec!["a\t1", "b\t2"]);
        Ok(())
    }

    #[cfg(all(target_os = "linux", feature = "compression-gzip"))]
    #[test]
    fn test_trailer_write_failure_is_reported() -> anyhow::Result<()> {
        // Writes to /dev/full fail with ENOSPC once the buffers are flushed.
        let mut w = auto_detect_writer(std::fs::File::create("/dev/full")?, "full.txt.gz")?;
        w.write_all(b"a\t1\n")?;
        assert!(w.finish().is_err());

        let mut w = auto_detect_writer(std::fs::File::create("/dev/full")?, "full.txt")?;
        w.write_all(b"a\t1\n")?;
        assert!(w.finish().is_err());
        Ok(())
    }

    #[test]
    fn test_plain_text_passes_through() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("plain.txt");
        write_lines(&path)?;
        assert_eq!(std::fs::read_to_string(&path)?, "hello\t5\nworld\t2\nnaïve\t1\n");
        Ok(())
    }

    #[test]
    fn test_compression_names() {
        assert_eq!("gz".parse::<Compression>(), Ok(Compression::Gzip));
        assert_eq!("BZIP2".parse::<Compression>(), Ok(Compression::Bzip2));
        assert!("rar".parse::<Compression>().is_err());
        assert_eq!(Compression::Zstd.to_string(), "zstd");
    }
}
