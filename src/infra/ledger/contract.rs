//! ABI surface of the notary contract. Only the calls the client makes are declared.

use alloy_sol_types::sol;

sol! {
    function mintDocument(string docId, string docHash, string ownerHash) returns (uint256 tokenId);
    function getDocumentContent(uint256 tokenId) returns (string docHash);
    function getDocumentOwner(uint256 tokenId) returns (string ownerHash);

    event DocumentMinted(uint256 indexed tokenId, string docHash, string ownerHash);
}
