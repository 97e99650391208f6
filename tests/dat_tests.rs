use ucode_rs::{dat, walk, WalkOptions};

#[test]
fn dat_text_walks_as_an_image() {
    // header, 4 words of data, no extended table
    let text = "/*  Sample microcode update  */\n\
                0x00000001,\t0x00000019,\t0x07012014,\t0x000306c3,\n\
                0x8eef2e9c,\t0x00000001,\t0x00000032,\t0x00000010,\n\
                0x00000040,\t0x00000000,\t0x00000000,\t0x00000000,\n\
                // data\n\
                0x11111111,\t0x22222222,\t0x33333333,\t0x44444444,\n";
    let image = dat::parse(text).unwrap();
    assert_eq!(image.len(), 64);

    let records: Vec<_> = walk(&image, WalkOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    let h = records[0].header;
    assert_eq!(h.revision, 0x19);
    assert_eq!(h.processor_signature, 0x306c3);
    assert_eq!(h.checksum, 0x8eef2e9c);
    assert_eq!(h.date.to_string(), "7/1/2014");
}
