//! RFC 1951 constants and fixed code tables.

// RFC 1951 match ( LZ77 ) limits.
pub const MIN_MATCH : usize = 3; // The smallest match eligible for LZ77 encoding.
pub const MAX_MATCH : usize = 258; // The largest match eligible for LZ77 encoding.
pub const MAX_DISTANCE : usize = 0x8000; // The largest distance backwards in input that can be encoded.

/// Largest payload of a stored block ( 16 bit length field ).
pub const MAX_STORED : usize = 0xffff;

// Alphabet sizes.
pub const LIT_SYMBOLS : usize = 286;
pub const DIST_SYMBOLS : usize = 30;
pub const BL_SYMBOLS : usize = 19;

pub const END_OF_BLOCK : usize = 256;

// Bit length alphabet repeat symbols.
pub const REPEAT_3_6 : usize = 16; // Previous length 3-6 times, 2 extra bits.
pub const REPEAT_ZERO_3_10 : usize = 17; // Zero length 3-10 times, 3 extra bits.
pub const REPEAT_ZERO_11_138 : usize = 18; // Zero length 11-138 times, 7 extra bits.

// Block types ( 2 bit header field ).
pub const STORED_BLOCK : u64 = 0;
pub const STATIC_TREES : u64 = 1;
pub const DYN_TREES : u64 = 2;

/// Order in which the bit length code lengths are transmitted, most likely first so trailing zeroes can be dropped.
pub static CLEN_ORDER : [u8; 19] = [ 16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15 ];

pub const MATCH_OFF : [u16; 29] = [ 3,4,5,6, 7,8,9,10, 11,13,15,17, 19,23,27,31, 35,43,51,59,
  67,83,99,115,  131,163,195,227, 258 ];

pub static MATCH_EXTRA : [u8; 29] = [ 0,0,0,0, 0,0,0,0, 1,1,1,1, 2,2,2,2, 3,3,3,3, 4,4,4,4, 5,5,5,5, 0 ];

pub static DIST_OFF : [u16; 30] = [ 1,2,3,4, 5,7,9,13, 17,25,33,49, 65,97,129,193, 257,385,513,769,
  1025,1537,2049,3073, 4097,6145,8193,12289, 16385,24577 ];

pub static DIST_EXTRA : [u8; 30] = [ 0,0,0,0, 1,1,2,2, 3,3,4,4, 5,5,6,6, 7,7,8,8, 9,9,10,10, 11,11,12,12, 13,13 ];

/// Index into MATCH_OFF for a match length in 3..=258 ( the literal/length symbol is 257 + index ).
pub const fn length_code( x: usize ) -> usize
{
  const LAST : usize = MATCH_OFF.len() - 1;
  const MAX : usize = MATCH_OFF[ LAST ] as usize;
  const LUT : [ u8; MAX ] = {
    let mut lut : [ u8; MAX ] = [ 0; MAX ];
    let mut i_val = 0;
    let mut i_lut = 0;
    while i_lut < lut.len() {
      while MATCH_OFF[ i_val + 1 ] <= i_lut as u16 {
        i_val += 1;
      }
      lut[ i_lut ] = i_val as u8;
      i_lut += 1;
    }
    lut
  };
  if x >= MAX { LAST } else { LUT[ x ] as usize }
}

/// Distance code for a distance in 1..=32768.
pub const fn distance_code( distance: usize ) -> usize
{
  let mut d = distance - 1;
  let mut code = 0;
  while d >= 4
  {
    code += 2;
    d >>= 1;
  }
  code + d
}

const BIT4_REVERSE : [u16; 16] = [ 0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15 ];

/// Reverse the bits of a 16 bit value, one nibble at a time.
pub const fn bit_reverse( x: u16 ) -> u16
{
  BIT4_REVERSE[ ( x & 0xf ) as usize ] << 12
    | BIT4_REVERSE[ ( ( x >> 4 ) & 0xf ) as usize ] << 8
    | BIT4_REVERSE[ ( ( x >> 8 ) & 0xf ) as usize ] << 4
    | BIT4_REVERSE[ ( x >> 12 ) as usize ]
}

// Fixed Huffman codes, RFC 1951 section 3.2.6. Codes are stored bit-reversed, ready for LSB-first output.

const fn static_lit() -> ( [u16; LIT_SYMBOLS], [u8; LIT_SYMBOLS] )
{
  let mut codes = [ 0u16; LIT_SYMBOLS ];
  let mut lengths = [ 0u8; LIT_SYMBOLS ];
  let mut i = 0;
  while i < LIT_SYMBOLS
  {
    let ( code, len ) =
      if i < 144 { ( 0x030 + i, 8 ) }
      else if i < 256 { ( 0x190 + i - 144, 9 ) }
      else if i < 280 { ( i - 256, 7 ) }
      else { ( 0x0c0 + i - 280, 8 ) };
    codes[ i ] = bit_reverse( ( code << ( 16 - len ) ) as u16 );
    lengths[ i ] = len as u8;
    i += 1;
  }
  ( codes, lengths )
}

const fn static_dist() -> [u16; DIST_SYMBOLS]
{
  let mut codes = [ 0u16; DIST_SYMBOLS ];
  let mut i = 0;
  while i < DIST_SYMBOLS
  {
    codes[ i ] = bit_reverse( ( i << 11 ) as u16 );
    i += 1;
  }
  codes
}

const STATIC_LIT : ( [u16; LIT_SYMBOLS], [u8; LIT_SYMBOLS] ) = static_lit();

pub static STATIC_LIT_CODES : [u16; LIT_SYMBOLS] = STATIC_LIT.0;
pub static STATIC_LIT_LENGTHS : [u8; LIT_SYMBOLS] = STATIC_LIT.1;
pub static STATIC_DIST_CODES : [u16; DIST_SYMBOLS] = static_dist();
pub static STATIC_DIST_LENGTHS : [u8; DIST_SYMBOLS] = [ 5; DIST_SYMBOLS ];
