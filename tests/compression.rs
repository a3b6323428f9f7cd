#[cfg(any(feature = "compression-gzip", feature = "compression-zstd"))]
mod compression_tests {
    use shardfix::io::compression::{
        CompressionCodec, EncodedWriter, auto_detect_reader, auto_detect_writer,
        detect_from_extension, register_codec,
    };
    use std::fs::File;
    use std::io::{BufWriter, Read, Write};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn round_trip(name: &str) -> anyhow::Result<String> {
        let dir = TempDir::new()?;
        let path = dir.path().join(name);
        let mut writer = auto_detect_writer(File::create(&path)?, &path)?;
        writer.write_all(b"{\"id\":1}\n{\"id\":2}\n")?;
        writer.finish()?;

        let mut out = String::new();
        auto_detect_reader(File::open(&path)?, &path)?.read_to_string(&mut out)?;
        Ok(out)
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_round_trip() -> anyhow::Result<()> {
        assert_eq!(round_trip("part_000.gz")?, "{\"id\":1}\n{\"id\":2}\n");
        Ok(())
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn test_zstd_round_trip() -> anyhow::Result<()> {
        assert_eq!(round_trip("part_000.zst")?, "{\"id\":1}\n{\"id\":2}\n");
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_output_is_actually_compressed() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.gz");
        let mut writer = auto_detect_writer(File::create(&path)?, &path)?;
        writer.write_all(b"{}\n")?;
        writer.finish()?;
        let bytes = std::fs::read(&path)?;
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_concatenated_gzip_members_are_read() -> anyhow::Result<()> {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let mut bytes = Vec::new();
        for chunk in [&b"{\"a\":1}\n"[..], &b"{\"a\":2}\n"[..]] {
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(chunk)?;
            bytes.extend(enc.finish()?);
        }

        let mut out = String::new();
        auto_detect_reader(std::io::Cursor::new(bytes), "x.gz")?.read_to_string(&mut out)?;
        assert_eq!(out, "{\"a\":1}\n{\"a\":2}\n");
        Ok(())
    }

    /// Upper-cases on write, passes through on read.
    struct ShoutCodec;

    struct ShoutWriter(BufWriter<Box<dyn Write + Send>>);

    impl Write for ShoutWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.write_all(&buf.to_ascii_uppercase())?;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.flush()
        }
    }

    impl EncodedWriter for ShoutWriter {
        fn finish(mut self: Box<Self>) -> std::io::Result<()> {
            self.0.flush()
        }
    }

    impl CompressionCodec for ShoutCodec {
        fn name(&self) -> &str {
            "shout"
        }

        fn extensions(&self) -> &[&str] {
            &[".shout"]
        }

        fn magic_bytes(&self) -> Option<&[u8]> {
            None
        }

        fn wrap_reader_dyn(
            &self,
            reader: Box<dyn Read + Send>,
        ) -> std::io::Result<Box<dyn Read + Send>> {
            Ok(reader)
        }

        fn wrap_writer_dyn(
            &self,
            writer: Box<dyn Write + Send>,
        ) -> std::io::Result<Box<dyn EncodedWriter>> {
            Ok(Box::new(ShoutWriter(BufWriter::new(writer))))
        }
    }

    #[test]
    fn test_custom_codec_registration() -> anyhow::Result<()> {
        register_codec(Arc::new(ShoutCodec));
        assert_eq!(
            detect_from_extension("a.shout").map(|c| c.name().to_string()),
            Some("shout".to_string())
        );
        assert_eq!(round_trip("x.shout")?, "{\"ID\":1}\n{\"ID\":2}\n");
        Ok(())
    }
}
